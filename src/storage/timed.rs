use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use super::{DataStore, NoteRecord, StoreError, TagRecord, TagUpdate};

/// Bounds every adapter call with a deadline. The call itself runs on a
/// short-lived worker thread and is left to finish on its own after a
/// timeout; there is no cancellation.
#[derive(Clone)]
pub struct TimedStore {
    inner: Arc<dyn DataStore>,
    timeout: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn DataStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    fn call<T, F>(&self, operation: &'static str, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn DataStore) -> Result<T, StoreError> + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let inner = Arc::clone(&self.inner);
        thread::Builder::new()
            .name(format!("store-{operation}"))
            .spawn(move || {
                let _ = tx.send(f(inner.as_ref()));
            })
            .map_err(|err| StoreError::Backend(format!("spawning {operation} worker: {err}")))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "store call timed out"
                );
                Err(StoreError::Timeout {
                    operation,
                    after: self.timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(StoreError::Backend(format!(
                "{operation} worker exited without a result"
            ))),
        }
    }
}

impl DataStore for TimedStore {
    fn load_all(&self) -> Result<(Vec<NoteRecord>, Vec<TagRecord>), StoreError> {
        self.call("load_all", |store| store.load_all())
    }

    fn create_note(
        &self,
        title: &str,
        text: &str,
        tag_name: &str,
    ) -> Result<NoteRecord, StoreError> {
        let (title, text, tag_name) = (title.to_string(), text.to_string(), tag_name.to_string());
        self.call("create_note", move |store| {
            store.create_note(&title, &text, &tag_name)
        })
    }

    fn update_note(
        &self,
        id: i64,
        title: &str,
        text: &str,
        tag_name: &str,
    ) -> Result<(), StoreError> {
        let (title, text, tag_name) = (title.to_string(), text.to_string(), tag_name.to_string());
        self.call("update_note", move |store| {
            store.update_note(id, &title, &text, &tag_name)
        })
    }

    fn delete_note(&self, id: i64) -> Result<(), StoreError> {
        self.call("delete_note", move |store| store.delete_note(id))
    }

    fn create_tag(&self, name: &str, color: &str) -> Result<TagRecord, StoreError> {
        let (name, color) = (name.to_string(), color.to_string());
        self.call("create_tag", move |store| store.create_tag(&name, &color))
    }

    fn update_tag(&self, id: i64, name: &str, color: &str) -> Result<TagUpdate, StoreError> {
        let (name, color) = (name.to_string(), color.to_string());
        self.call("update_tag", move |store| store.update_tag(id, &name, &color))
    }

    fn delete_tag(&self, id: i64, reassign_to: Option<&str>) -> Result<usize, StoreError> {
        let reassign_to = reassign_to.map(str::to_string);
        self.call("delete_tag", move |store| {
            store.delete_tag(id, reassign_to.as_deref())
        })
    }
}
