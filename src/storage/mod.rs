use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::config::DbConfig;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use time::OffsetDateTime;

use crate::config::{ConfigPaths, StorageOptions};

pub mod local;
#[cfg(test)]
pub mod memory;
mod schema;
pub mod timed;

pub use local::LocalStore;
pub use timed::TimedStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRecord {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub tag_name: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagUpdate {
    pub previous_name: String,
    pub relabeled: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("{0}")]
    Conflict(String),
    #[error("{operation} timed out after {} ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error("{0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict(err.to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(format!("malformed local store: {err}"))
    }
}

/// Persistence contract consumed by the command handlers.
///
/// Notes come back newest first, tags oldest first. Implementations never
/// retry; every failure is reported to the caller as a [`StoreError`].
pub trait DataStore: Send + Sync {
    fn load_all(&self) -> Result<(Vec<NoteRecord>, Vec<TagRecord>), StoreError>;

    fn create_note(&self, title: &str, text: &str, tag_name: &str)
        -> Result<NoteRecord, StoreError>;

    fn update_note(&self, id: i64, title: &str, text: &str, tag_name: &str)
        -> Result<(), StoreError>;

    fn delete_note(&self, id: i64) -> Result<(), StoreError>;

    fn create_tag(&self, name: &str, color: &str) -> Result<TagRecord, StoreError>;

    /// Renames/recolors a tag and relabels every note that referenced the old
    /// name, in one atomic step.
    fn update_tag(&self, id: i64, name: &str, color: &str) -> Result<TagUpdate, StoreError>;

    /// Removes a tag. Notes that carried it are relabeled to `reassign_to`
    /// when given; the return value counts those notes.
    fn delete_tag(&self, id: i64, reassign_to: Option<&str>) -> Result<usize, StoreError>;
}

pub(crate) fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    pub fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&*self.db_path).map_err(|err| {
            StoreError::Backend(format!(
                "opening database {}: {err}",
                self.db_path.display()
            ))
        })?;
        prepare_connection(&conn, &self.options)
            .map_err(|err| StoreError::Backend(format!("{err:#}")))?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn for_owner(&self, owner_id: &str) -> UserStore {
        UserStore {
            storage: self.clone(),
            owner: Arc::from(owner_id),
        }
    }
}

/// Relational store restricted to one account's rows.
#[derive(Clone)]
pub struct UserStore {
    storage: StorageHandle,
    owner: Arc<str>,
}

impl UserStore {
    fn fetch_tag_name(conn: &Connection, owner: &str, id: i64) -> Result<String, StoreError> {
        conn.query_row(
            "SELECT name FROM tags WHERE id = ?1 AND owner_id = ?2",
            params![id, owner],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .ok_or(StoreError::NotFound { entity: "tag", id })
    }
}

impl DataStore for UserStore {
    fn load_all(&self) -> Result<(Vec<NoteRecord>, Vec<TagRecord>), StoreError> {
        self.storage.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, body, tag_name, created_at
                 FROM notes
                 WHERE owner_id = ?1
                 ORDER BY created_at DESC, id DESC",
            )?;
            let notes = stmt
                .query_map(params![&*self.owner], |row| {
                    Ok(NoteRecord {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        text: row.get(2)?,
                        tag_name: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut stmt = conn.prepare(
                "SELECT id, name, color, created_at
                 FROM tags
                 WHERE owner_id = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let tags = stmt
                .query_map(params![&*self.owner], |row| {
                    Ok(TagRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        color: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok((notes, tags))
        })
    }

    fn create_note(
        &self,
        title: &str,
        text: &str,
        tag_name: &str,
    ) -> Result<NoteRecord, StoreError> {
        self.storage.with_connection(|conn| {
            let now = now_millis();
            conn.execute(
                "INSERT INTO notes (owner_id, title, body, tag_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![&*self.owner, title, text, tag_name, now],
            )?;
            Ok(NoteRecord {
                id: conn.last_insert_rowid(),
                title: title.to_string(),
                text: text.to_string(),
                tag_name: tag_name.to_string(),
                created_at: now,
            })
        })
    }

    fn update_note(
        &self,
        id: i64,
        title: &str,
        text: &str,
        tag_name: &str,
    ) -> Result<(), StoreError> {
        self.storage.with_connection(|conn| {
            let updated = conn.execute(
                "UPDATE notes SET title = ?1, body = ?2, tag_name = ?3
                 WHERE id = ?4 AND owner_id = ?5",
                params![title, text, tag_name, id, &*self.owner],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound { entity: "note", id });
            }
            Ok(())
        })
    }

    fn delete_note(&self, id: i64) -> Result<(), StoreError> {
        self.storage.with_connection(|conn| {
            let deleted = conn.execute(
                "DELETE FROM notes WHERE id = ?1 AND owner_id = ?2",
                params![id, &*self.owner],
            )?;
            if deleted == 0 {
                return Err(StoreError::NotFound { entity: "note", id });
            }
            Ok(())
        })
    }

    fn create_tag(&self, name: &str, color: &str) -> Result<TagRecord, StoreError> {
        self.storage.with_connection(|conn| {
            let now = now_millis();
            conn.execute(
                "INSERT INTO tags (owner_id, name, color, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![&*self.owner, name, color, now],
            )
            .map_err(|err| match StoreError::from(err) {
                StoreError::Conflict(_) => {
                    StoreError::Conflict(format!("tag '{name}' already exists"))
                }
                other => other,
            })?;
            Ok(TagRecord {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
                color: color.to_string(),
                created_at: now,
            })
        })
    }

    fn update_tag(&self, id: i64, name: &str, color: &str) -> Result<TagUpdate, StoreError> {
        let mut conn = self.storage.connect()?;
        let tx = conn.transaction()?;
        let previous_name = Self::fetch_tag_name(&tx, &self.owner, id)?;
        tx.execute(
            "UPDATE tags SET name = ?1, color = ?2 WHERE id = ?3 AND owner_id = ?4",
            params![name, color, id, &*self.owner],
        )
        .map_err(|err| match StoreError::from(err) {
            StoreError::Conflict(_) => StoreError::Conflict(format!("tag '{name}' already exists")),
            other => other,
        })?;
        let relabeled = if previous_name != name {
            tx.execute(
                "UPDATE notes SET tag_name = ?1 WHERE owner_id = ?2 AND tag_name = ?3",
                params![name, &*self.owner, previous_name],
            )?
        } else {
            0
        };
        tx.commit()?;
        Ok(TagUpdate {
            previous_name,
            relabeled,
        })
    }

    fn delete_tag(&self, id: i64, reassign_to: Option<&str>) -> Result<usize, StoreError> {
        let mut conn = self.storage.connect()?;
        let tx = conn.transaction()?;
        let name = Self::fetch_tag_name(&tx, &self.owner, id)?;
        let relabeled = match reassign_to {
            Some(target) => tx.execute(
                "UPDATE notes SET tag_name = ?1 WHERE owner_id = ?2 AND tag_name = ?3",
                params![target, &*self.owner, name],
            )?,
            None => 0,
        };
        tx.execute(
            "DELETE FROM tags WHERE id = ?1 AND owner_id = ?2",
            params![id, &*self.owner],
        )?;
        tx.commit()?;
        Ok(relabeled)
    }
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<StorageHandle> {
    let db_path = &paths.database_path;
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    tracing::debug!(path = %db_path.display(), "database ready");
    Ok(StorageHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.set_db_config(DbConfig::SQLITE_DBCONFIG_ENABLE_FKEY, true)
        .context("enabling foreign keys")?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    pub fn temp_paths(root: &TempDir) -> ConfigPaths {
        let base = root.path();
        let config_dir = base.join("config");
        let data_dir = base.join("data");
        let state_dir = base.join("state");
        ConfigPaths {
            config_dir: config_dir.clone(),
            config_file: config_dir.join("config.toml"),
            data_dir: data_dir.clone(),
            database_path: data_dir.join("tagnotes.db"),
            local_dir: data_dir.join("local"),
            log_dir: state_dir.join("logs"),
            session_file: state_dir.join("session.json"),
            state_dir,
        }
    }

    pub fn init_storage() -> anyhow::Result<(TempDir, ConfigPaths, StorageHandle)> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        let mut options = StorageOptions::default();
        options.database_path = paths.database_path.clone();
        let storage = init(&paths, &options)?;
        Ok((temp, paths, storage))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::init_storage;
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn load_orders_notes_newest_first_and_tags_oldest_first() -> anyhow::Result<()> {
        let (_temp, _paths, storage) = init_storage()?;
        let store = storage.for_owner("owner-a");
        store.create_tag("Work", "#3b82f6")?;
        store.create_tag("Home", "#10b981")?;
        let first = store.create_note("", "first", "Work")?;
        let second = store.create_note("", "second", "Home")?;

        let (notes, tags) = store.load_all()?;
        let note_ids: Vec<i64> = notes.iter().map(|note| note.id).collect();
        assert_eq!(note_ids, vec![second.id, first.id]);
        let tag_names: Vec<&str> = tags.iter().map(|tag| tag.name.as_str()).collect();
        assert_eq!(tag_names, vec!["Work", "Home"]);
        Ok(())
    }

    #[test]
    fn rows_are_scoped_per_owner() -> anyhow::Result<()> {
        let (_temp, _paths, storage) = init_storage()?;
        let alice = storage.for_owner("alice");
        let bob = storage.for_owner("bob");
        alice.create_tag("Work", "#3b82f6")?;
        let note = alice.create_note("Plan", "ship it", "Work")?;

        let (notes, tags) = bob.load_all()?;
        assert!(notes.is_empty());
        assert!(tags.is_empty());
        assert_matches!(
            bob.delete_note(note.id),
            Err(StoreError::NotFound { entity: "note", .. })
        );
        // the same name is free for another owner
        bob.create_tag("work", "#3b82f6")?;
        Ok(())
    }

    #[test]
    fn duplicate_tag_names_conflict_case_insensitively() -> anyhow::Result<()> {
        let (_temp, _paths, storage) = init_storage()?;
        let store = storage.for_owner("owner");
        store.create_tag("Work", "#3b82f6")?;
        assert_matches!(
            store.create_tag("WORK", "#000000"),
            Err(StoreError::Conflict(message)) if message.contains("WORK")
        );
        Ok(())
    }

    #[test]
    fn update_tag_relabels_exact_matches_only() -> anyhow::Result<()> {
        let (_temp, _paths, storage) = init_storage()?;
        let store = storage.for_owner("owner");
        let work = store.create_tag("Work", "#3b82f6")?;
        store.create_tag("work-ish", "#111111")?;
        let tagged = store.create_note("", "a", "Work")?;
        let other = store.create_note("", "b", "work-ish")?;

        let outcome = store.update_tag(work.id, "Job", "#222222")?;
        assert_eq!(outcome.previous_name, "Work");
        assert_eq!(outcome.relabeled, 1);

        let (notes, tags) = store.load_all()?;
        let by_id = |id: i64| notes.iter().find(|note| note.id == id).expect("note");
        assert_eq!(by_id(tagged.id).tag_name, "Job");
        assert_eq!(by_id(other.id).tag_name, "work-ish");
        assert!(!notes.iter().any(|note| note.tag_name == "Work"));
        assert_eq!(tags[0].color, "#222222");
        Ok(())
    }

    #[test]
    fn update_tag_keeps_created_order_and_note_timestamps() -> anyhow::Result<()> {
        let (_temp, _paths, storage) = init_storage()?;
        let store = storage.for_owner("owner");
        let work = store.create_tag("Work", "#3b82f6")?;
        let note = store.create_note("t", "body", "Work")?;
        store.update_note(note.id, "t2", "body2", "Work")?;
        store.update_tag(work.id, "Work", "#000000")?;

        let (notes, _) = store.load_all()?;
        assert_eq!(notes[0].created_at, note.created_at);
        assert_eq!(notes[0].title, "t2");
        Ok(())
    }

    #[test]
    fn delete_tag_reassigns_notes_to_fallback() -> anyhow::Result<()> {
        let (_temp, _paths, storage) = init_storage()?;
        let store = storage.for_owner("owner");
        store.create_tag("Work", "#3b82f6")?;
        let personal = store.create_tag("Personal", "#ef4444")?;
        store.create_note("", "groceries", "Personal")?;
        store.create_note("", "standup", "Work")?;

        let relabeled = store.delete_tag(personal.id, Some("Work"))?;
        assert_eq!(relabeled, 1);
        let (notes, tags) = store.load_all()?;
        assert_eq!(tags.len(), 1);
        assert!(notes.iter().all(|note| note.tag_name == "Work"));
        Ok(())
    }

    #[test]
    fn missing_rows_report_not_found() -> anyhow::Result<()> {
        let (_temp, _paths, storage) = init_storage()?;
        let store = storage.for_owner("owner");
        assert_matches!(
            store.update_note(99, "", "x", "Work"),
            Err(StoreError::NotFound { entity: "note", id: 99 })
        );
        assert_matches!(
            store.update_tag(7, "x", "#000000"),
            Err(StoreError::NotFound { entity: "tag", id: 7 })
        );
        assert_matches!(
            store.delete_tag(7, None),
            Err(StoreError::NotFound { entity: "tag", id: 7 })
        );
        Ok(())
    }
}
