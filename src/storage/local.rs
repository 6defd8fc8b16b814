//! Key-value fallback store: one JSON document per account holding the
//! `savedNotes` and `savedTags` arrays.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{now_millis, DataStore, NoteRecord, StoreError, TagRecord, TagUpdate};

const TMP_EXTENSION: &str = "json.tmp";
/// Tag ids below this value predate timestamp ids and get reassigned.
const LEGACY_ID_CEILING: i64 = 100_000;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalDocument {
    #[serde(default)]
    saved_notes: Vec<StoredNote>,
    #[serde(default)]
    saved_tags: Vec<StoredTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredNote {
    id: i64,
    #[serde(default)]
    title: String,
    text: String,
    #[serde(default)]
    tag: String,
    timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredTag {
    id: Value,
    name: String,
    color: String,
}

impl StoredTag {
    fn numeric_id(&self) -> Option<i64> {
        self.id.as_i64()
    }

    fn is_legacy(&self) -> bool {
        match self.numeric_id() {
            Some(id) => id < LEGACY_ID_CEILING,
            None => true,
        }
    }
}

impl LocalDocument {
    fn next_id(&self) -> i64 {
        let highest = self
            .saved_notes
            .iter()
            .map(|note| note.id)
            .chain(self.saved_tags.iter().filter_map(StoredTag::numeric_id))
            .max()
            .unwrap_or(0);
        now_millis().max(highest + 1)
    }

    fn tag_index(&self, id: i64) -> Result<usize, StoreError> {
        self.saved_tags
            .iter()
            .position(|tag| tag.numeric_id() == Some(id))
            .ok_or(StoreError::NotFound { entity: "tag", id })
    }

    fn ensure_unique_name(&self, name: &str, except: Option<i64>) -> Result<(), StoreError> {
        let lowered = name.to_lowercase();
        let clash = self.saved_tags.iter().any(|tag| {
            tag.name.to_lowercase() == lowered && (except.is_none() || tag.numeric_id() != except)
        });
        if clash {
            return Err(StoreError::Conflict(format!("tag '{name}' already exists")));
        }
        Ok(())
    }

    /// Returns true when any tag id had to be reassigned.
    fn migrate_legacy_ids(&mut self) -> bool {
        if !self.saved_tags.iter().any(StoredTag::is_legacy) {
            return false;
        }
        let base = now_millis();
        for (index, tag) in self.saved_tags.iter_mut().enumerate() {
            tag.id = Value::from(base + index as i64);
        }
        true
    }
}

pub struct LocalStore {
    path: PathBuf,
    /// Guards read-modify-write cycles; the flag records whether the legacy
    /// id migration has already been checked for this store.
    migrated: Mutex<bool>,
}

impl LocalStore {
    pub fn open(dir: &Path, owner_id: &str) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(format!("{owner_id}.json")),
            migrated: Mutex::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<LocalDocument, StoreError> {
        if !self.path.exists() {
            return Ok(LocalDocument::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(LocalDocument::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn write(&self, document: &LocalDocument) -> Result<(), StoreError> {
        let encoded = serde_json::to_string_pretty(document)?;
        let tmp = self.path.with_extension(TMP_EXTENSION);
        fs::write(&tmp, encoded)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn with_document<T>(
        &self,
        f: impl FnOnce(&mut LocalDocument) -> Result<(T, bool), StoreError>,
    ) -> Result<T, StoreError> {
        let mut migrated = self.migrated.lock();
        let mut document = self.read()?;
        let mut dirty = false;
        if !*migrated {
            if document.migrate_legacy_ids() {
                tracing::info!(path = %self.path.display(), "reassigned legacy tag ids");
                dirty = true;
            }
            *migrated = true;
        }
        let (value, changed) = f(&mut document)?;
        if dirty || changed {
            self.write(&document)?;
        }
        Ok(value)
    }
}

impl DataStore for LocalStore {
    fn load_all(&self) -> Result<(Vec<NoteRecord>, Vec<TagRecord>), StoreError> {
        self.with_document(|document| {
            let notes = document
                .saved_notes
                .iter()
                .map(|note| NoteRecord {
                    id: note.id,
                    title: note.title.clone(),
                    text: note.text.clone(),
                    tag_name: note.tag.clone(),
                    created_at: note.timestamp,
                })
                .collect();
            let tags = document
                .saved_tags
                .iter()
                .filter_map(|tag| {
                    let id = tag.numeric_id()?;
                    Some(TagRecord {
                        id,
                        name: tag.name.clone(),
                        color: tag.color.clone(),
                        created_at: id,
                    })
                })
                .collect();
            Ok(((notes, tags), false))
        })
    }

    fn create_note(
        &self,
        title: &str,
        text: &str,
        tag_name: &str,
    ) -> Result<NoteRecord, StoreError> {
        self.with_document(|document| {
            let id = document.next_id();
            let stored = StoredNote {
                id,
                title: title.to_string(),
                text: text.to_string(),
                tag: tag_name.to_string(),
                timestamp: id,
            };
            document.saved_notes.insert(0, stored);
            Ok((
                NoteRecord {
                    id,
                    title: title.to_string(),
                    text: text.to_string(),
                    tag_name: tag_name.to_string(),
                    created_at: id,
                },
                true,
            ))
        })
    }

    fn update_note(
        &self,
        id: i64,
        title: &str,
        text: &str,
        tag_name: &str,
    ) -> Result<(), StoreError> {
        self.with_document(|document| {
            let note = document
                .saved_notes
                .iter_mut()
                .find(|note| note.id == id)
                .ok_or(StoreError::NotFound { entity: "note", id })?;
            note.title = title.to_string();
            note.text = text.to_string();
            note.tag = tag_name.to_string();
            Ok(((), true))
        })
    }

    fn delete_note(&self, id: i64) -> Result<(), StoreError> {
        self.with_document(|document| {
            let before = document.saved_notes.len();
            document.saved_notes.retain(|note| note.id != id);
            if document.saved_notes.len() == before {
                return Err(StoreError::NotFound { entity: "note", id });
            }
            Ok(((), true))
        })
    }

    fn create_tag(&self, name: &str, color: &str) -> Result<TagRecord, StoreError> {
        self.with_document(|document| {
            document.ensure_unique_name(name, None)?;
            let id = document.next_id();
            document.saved_tags.push(StoredTag {
                id: Value::from(id),
                name: name.to_string(),
                color: color.to_string(),
            });
            Ok((
                TagRecord {
                    id,
                    name: name.to_string(),
                    color: color.to_string(),
                    created_at: id,
                },
                true,
            ))
        })
    }

    fn update_tag(&self, id: i64, name: &str, color: &str) -> Result<TagUpdate, StoreError> {
        self.with_document(|document| {
            let index = document.tag_index(id)?;
            document.ensure_unique_name(name, Some(id))?;
            let tag = &mut document.saved_tags[index];
            let previous_name = std::mem::replace(&mut tag.name, name.to_string());
            tag.color = color.to_string();
            let mut relabeled = 0;
            if previous_name != name {
                for note in document
                    .saved_notes
                    .iter_mut()
                    .filter(|note| note.tag == previous_name)
                {
                    note.tag = name.to_string();
                    relabeled += 1;
                }
            }
            Ok((
                TagUpdate {
                    previous_name,
                    relabeled,
                },
                true,
            ))
        })
    }

    fn delete_tag(&self, id: i64, reassign_to: Option<&str>) -> Result<usize, StoreError> {
        self.with_document(|document| {
            let index = document.tag_index(id)?;
            let removed = document.saved_tags.remove(index);
            let mut relabeled = 0;
            if let Some(target) = reassign_to {
                for note in document
                    .saved_notes
                    .iter_mut()
                    .filter(|note| note.tag == removed.name)
                {
                    note.tag = target.to_string();
                    relabeled += 1;
                }
            }
            Ok((relabeled, true))
        })
    }
}
