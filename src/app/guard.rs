use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// What a mutation is about to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKey {
    NewNote,
    Note(i64),
    NewTag,
    Tag(i64),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::NewNote => f.write_str("new note"),
            EntityKey::Note(id) => write!(f, "note {id}"),
            EntityKey::NewTag => f.write_str("new tag"),
            EntityKey::Tag(id) => write!(f, "tag {id}"),
        }
    }
}

/// Set of entities with a mutation in progress. Clones share the set.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    busy: Arc<Mutex<HashSet<EntityKey>>>,
}

impl InFlight {
    pub fn try_acquire(&self, key: EntityKey) -> Option<Ticket> {
        if !self.busy.lock().insert(key) {
            tracing::debug!(%key, "mutation already in flight");
            return None;
        }
        Some(Ticket {
            key,
            busy: Arc::clone(&self.busy),
        })
    }

    #[cfg(test)]
    pub fn is_busy(&self, key: EntityKey) -> bool {
        self.busy.lock().contains(&key)
    }
}

/// Releases its key when dropped.
#[derive(Debug)]
pub struct Ticket {
    key: EntityKey,
    busy: Arc<Mutex<HashSet<EntityKey>>>,
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.busy.lock().remove(&self.key);
    }
}
