//! In-memory store used by handler and gate tests. Supports injected
//! failures, artificial latency and call counting.

use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::{DataStore, NoteRecord, StoreError, TagRecord, TagUpdate};

#[derive(Debug, Default)]
struct Inner {
    notes: Vec<NoteRecord>,
    tags: Vec<TagRecord>,
    next_id: i64,
    clock: i64,
    fail_next: Option<StoreError>,
    /// Calls left before the scheduled failure fires.
    fail_at: Option<(usize, StoreError)>,
    delay: Option<Duration>,
    mutations: usize,
    loads: usize,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn seeded(tags: &[(i64, &str, &str)], notes: &[(i64, &str, &str)]) -> Self {
        let store = Self::default();
        {
            let mut inner = store.inner.lock();
            for (index, (id, name, color)) in tags.iter().enumerate() {
                inner.tags.push(TagRecord {
                    id: *id,
                    name: name.to_string(),
                    color: color.to_string(),
                    created_at: index as i64,
                });
            }
            for (index, (id, text, tag)) in notes.iter().enumerate() {
                inner.notes.push(NoteRecord {
                    id: *id,
                    title: String::new(),
                    text: text.to_string(),
                    tag_name: tag.to_string(),
                    created_at: 1_000 - index as i64,
                });
            }
            let highest = tags
                .iter()
                .map(|(id, ..)| *id)
                .chain(notes.iter().map(|(id, ..)| *id))
                .max()
                .unwrap_or(0);
            inner.next_id = highest + 1;
            inner.clock = 1_000;
        }
        store
    }

    pub fn fail_next(&self, err: StoreError) {
        self.inner.lock().fail_next = Some(err);
    }

    /// Fails the `nth` call from now, counting loads and mutations alike.
    pub fn fail_call(&self, nth: usize, err: StoreError) {
        self.inner.lock().fail_at = Some((nth.max(1), err));
    }

    pub fn set_delay(&self, delay: Duration) {
        self.inner.lock().delay = Some(delay);
    }

    pub fn mutations(&self) -> usize {
        self.inner.lock().mutations
    }

    pub fn loads(&self) -> usize {
        self.inner.lock().loads
    }

    pub fn notes(&self) -> Vec<NoteRecord> {
        self.inner.lock().notes.clone()
    }

    pub fn tags(&self) -> Vec<TagRecord> {
        self.inner.lock().tags.clone()
    }

    fn begin(&self, mutating: bool) -> Result<parking_lot::MutexGuard<'_, Inner>, StoreError> {
        let delay = self.inner.lock().delay;
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        let mut inner = self.inner.lock();
        if let Some(err) = inner.fail_next.take() {
            return Err(err);
        }
        if let Some((remaining, err)) = inner.fail_at.take() {
            if remaining <= 1 {
                return Err(err);
            }
            inner.fail_at = Some((remaining - 1, err));
        }
        if mutating {
            inner.mutations += 1;
        } else {
            inner.loads += 1;
        }
        Ok(inner)
    }
}

impl Inner {
    fn allocate(&mut self) -> (i64, i64) {
        self.next_id = self.next_id.max(1);
        let id = self.next_id;
        self.next_id += 1;
        self.clock += 1;
        (id, self.clock)
    }

    fn ensure_unique(&self, name: &str, except: Option<i64>) -> Result<(), StoreError> {
        let lowered = name.to_lowercase();
        if self
            .tags
            .iter()
            .any(|tag| tag.name.to_lowercase() == lowered && Some(tag.id) != except)
        {
            return Err(StoreError::Conflict(format!("tag '{name}' already exists")));
        }
        Ok(())
    }
}

impl DataStore for MemoryStore {
    fn load_all(&self) -> Result<(Vec<NoteRecord>, Vec<TagRecord>), StoreError> {
        let inner = self.begin(false)?;
        let mut notes = inner.notes.clone();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut tags = inner.tags.clone();
        tags.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok((notes, tags))
    }

    fn create_note(
        &self,
        title: &str,
        text: &str,
        tag_name: &str,
    ) -> Result<NoteRecord, StoreError> {
        let mut inner = self.begin(true)?;
        let (id, created_at) = inner.allocate();
        let note = NoteRecord {
            id,
            title: title.to_string(),
            text: text.to_string(),
            tag_name: tag_name.to_string(),
            created_at,
        };
        inner.notes.push(note.clone());
        Ok(note)
    }

    fn update_note(
        &self,
        id: i64,
        title: &str,
        text: &str,
        tag_name: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.begin(true)?;
        let note = inner
            .notes
            .iter_mut()
            .find(|note| note.id == id)
            .ok_or(StoreError::NotFound { entity: "note", id })?;
        note.title = title.to_string();
        note.text = text.to_string();
        note.tag_name = tag_name.to_string();
        Ok(())
    }

    fn delete_note(&self, id: i64) -> Result<(), StoreError> {
        let mut inner = self.begin(true)?;
        let before = inner.notes.len();
        inner.notes.retain(|note| note.id != id);
        if inner.notes.len() == before {
            return Err(StoreError::NotFound { entity: "note", id });
        }
        Ok(())
    }

    fn create_tag(&self, name: &str, color: &str) -> Result<TagRecord, StoreError> {
        let mut inner = self.begin(true)?;
        inner.ensure_unique(name, None)?;
        let (id, created_at) = inner.allocate();
        let tag = TagRecord {
            id,
            name: name.to_string(),
            color: color.to_string(),
            created_at,
        };
        inner.tags.push(tag.clone());
        Ok(tag)
    }

    fn update_tag(&self, id: i64, name: &str, color: &str) -> Result<TagUpdate, StoreError> {
        let mut inner = self.begin(true)?;
        inner.ensure_unique(name, Some(id))?;
        let tag = inner
            .tags
            .iter_mut()
            .find(|tag| tag.id == id)
            .ok_or(StoreError::NotFound { entity: "tag", id })?;
        let previous_name = std::mem::replace(&mut tag.name, name.to_string());
        tag.color = color.to_string();
        let mut relabeled = 0;
        if previous_name != name {
            for note in inner.notes.iter_mut().filter(|note| note.tag_name == previous_name) {
                note.tag_name = name.to_string();
                relabeled += 1;
            }
        }
        Ok(TagUpdate {
            previous_name,
            relabeled,
        })
    }

    fn delete_tag(&self, id: i64, reassign_to: Option<&str>) -> Result<usize, StoreError> {
        let mut inner = self.begin(true)?;
        let index = inner
            .tags
            .iter()
            .position(|tag| tag.id == id)
            .ok_or(StoreError::NotFound { entity: "tag", id })?;
        let removed = inner.tags.remove(index);
        let mut relabeled = 0;
        if let Some(target) = reassign_to {
            for note in inner.notes.iter_mut().filter(|note| note.tag_name == removed.name) {
                note.tag_name = target.to_string();
                relabeled += 1;
            }
        }
        Ok(relabeled)
    }
}
