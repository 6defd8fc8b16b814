use std::sync::Arc;

use crate::app::guard::{EntityKey, InFlight, Ticket};
use crate::app::messages::Messages;
use crate::app::prompt::Prompt;
use crate::app::state::{Filter, NoteDraft, SessionState, TagDraft};
use crate::app::view::{render_all, FormField, Screen, ViewModel};
use crate::config::palette;
use crate::storage::{DataStore, StoreError};

/// Input rejected before any store call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("note text is empty")]
    EmptyNoteText,
    #[error("tag name is empty")]
    EmptyTagName,
    #[error("tag '{0}' already exists")]
    DuplicateTagName(String),
    #[error("'{0}' is not a #rrggbb color")]
    InvalidColor(String),
    #[error("the last tag cannot be deleted")]
    LastTag,
}

/// Instruction for whichever front end is driving the handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Alert(String),
    Render(ViewModel),
    ShowScreen(Screen),
    Focus(FormField),
    Busy(EntityKey),
}

/// Note and tag operations for one signed-in account.
#[derive(Clone)]
pub struct Handlers {
    store: Arc<dyn DataStore>,
    prompt: Arc<dyn Prompt>,
    in_flight: InFlight,
    messages: Messages,
}

impl Handlers {
    pub fn new(
        store: Arc<dyn DataStore>,
        prompt: Arc<dyn Prompt>,
        in_flight: InFlight,
        messages: Messages,
    ) -> Self {
        Self {
            store,
            prompt,
            in_flight,
            messages,
        }
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    pub fn render(&self, state: &SessionState) -> Effect {
        Effect::Render(render_all(state, &self.messages))
    }

    fn alert(&self, text: impl Into<String>) -> Vec<Effect> {
        vec![Effect::Alert(text.into())]
    }

    fn invalid(&self, err: ValidationError) -> Vec<Effect> {
        tracing::debug!(%err, "input rejected");
        self.alert(self.messages.validation(&err))
    }

    fn store_failure(&self, operation: &'static str, err: StoreError) -> Vec<Effect> {
        tracing::error!(?err, operation, "store call failed");
        self.alert(self.messages.store_failed(&err))
    }

    fn acquire(&self, key: EntityKey) -> Result<Ticket, Vec<Effect>> {
        self.in_flight
            .try_acquire(key)
            .ok_or_else(|| vec![Effect::Busy(key)])
    }

    /// Replaces local state with a fresh load. On failure the previous
    /// snapshot stays in place.
    pub fn reload(&self, state: &mut SessionState) -> Vec<Effect> {
        self.try_reload(state).unwrap_or_else(|alert| alert)
    }

    fn try_reload(&self, state: &mut SessionState) -> Result<Vec<Effect>, Vec<Effect>> {
        match self.store.load_all() {
            Ok((notes, tags)) => {
                tracing::debug!(notes = notes.len(), tags = tags.len(), "state reloaded");
                state.replace_data(notes, tags);
                Ok(vec![self.render(state)])
            }
            Err(err) => {
                tracing::error!(?err, "reload failed");
                Err(self.alert(self.messages.load_failed(&err)))
            }
        }
    }

    /// Creates the given tags in order when the loaded state has none.
    /// Clashing names are skipped.
    pub fn seed_tags(
        &self,
        state: &SessionState,
        defaults: &[(String, String)],
    ) -> Result<usize, StoreError> {
        if !state.tags.is_empty() {
            return Ok(0);
        }
        let mut created = 0;
        for (name, color) in defaults {
            match self.store.create_tag(name, color) {
                Ok(_) => created += 1,
                Err(StoreError::Conflict(_)) => {
                    tracing::debug!(%name, "default tag already present");
                }
                Err(err) => return Err(err),
            }
        }
        tracing::info!(created, "seeded default tags");
        Ok(created)
    }

    pub fn begin_edit_note(&self, state: &mut SessionState, id: i64) -> Vec<Effect> {
        let Some(note) = state.note(id) else {
            return self.alert(self.messages.note_not_found());
        };
        state.note_draft = NoteDraft {
            title: note.title.clone(),
            text: note.text.clone(),
            tag_name: note.tag_name.clone(),
        };
        state.editing_note_id = Some(id);
        vec![self.render(state), Effect::Focus(FormField::NoteTitle)]
    }

    pub fn cancel_edit_note(&self, state: &mut SessionState) -> Vec<Effect> {
        state.cancel_note_edit();
        vec![self.render(state)]
    }

    pub fn save_note(&self, state: &mut SessionState) -> Vec<Effect> {
        let key = state
            .editing_note_id
            .map(EntityKey::Note)
            .unwrap_or(EntityKey::NewNote);
        let _ticket = match self.acquire(key) {
            Ok(ticket) => ticket,
            Err(busy) => return busy,
        };

        let title = state.note_draft.title.trim().to_string();
        let text = state.note_draft.text.trim().to_string();
        if text.is_empty() {
            return self.invalid(ValidationError::EmptyNoteText);
        }
        // An untouched tag on an existing note is kept even when it matches
        // no tag.
        let kept = state
            .editing_note_id
            .and_then(|id| state.note(id))
            .filter(|note| note.tag_name == state.note_draft.tag_name)
            .map(|note| note.tag_name.clone());
        let tag_name = kept.unwrap_or_else(|| {
            state
                .selected_tag()
                .map(|tag| tag.name.clone())
                .unwrap_or_default()
        });

        let result = match state.editing_note_id {
            Some(id) => self.store.update_note(id, &title, &text, &tag_name),
            None => self
                .store
                .create_note(&title, &text, &tag_name)
                .map(|note| {
                    tracing::debug!(id = note.id, "note created");
                }),
        };
        if let Err(err) = result {
            return self.store_failure("save note", err);
        }

        state.cancel_note_edit();
        self.reload(state)
    }

    pub fn delete_note(&self, state: &mut SessionState, id: i64) -> Vec<Effect> {
        let _ticket = match self.acquire(EntityKey::Note(id)) {
            Ok(ticket) => ticket,
            Err(busy) => return busy,
        };
        if state.note(id).is_none() {
            return self.alert(self.messages.note_not_found());
        }
        if !self.prompt.confirm(self.messages.confirm_delete_note()) {
            return Vec::new();
        }
        if let Err(err) = self.store.delete_note(id) {
            return self.store_failure("delete note", err);
        }
        tracing::debug!(id, "note deleted");
        if state.editing_note_id == Some(id) {
            state.cancel_note_edit();
        }
        self.reload(state)
    }

    pub fn begin_edit_tag(&self, state: &mut SessionState, id: i64) -> Vec<Effect> {
        let Some(tag) = state.tag(id) else {
            return self.alert(self.messages.tag_not_found());
        };
        state.tag_draft = TagDraft {
            name: tag.name.clone(),
            color: tag.color.clone(),
        };
        state.editing_tag_id = Some(id);
        state.tag_panel_expanded = true;
        vec![self.render(state), Effect::Focus(FormField::TagName)]
    }

    pub fn cancel_edit_tag(&self, state: &mut SessionState) -> Vec<Effect> {
        state.cancel_tag_edit();
        vec![self.render(state)]
    }

    fn validate_tag(&self, state: &SessionState) -> Result<(String, String), ValidationError> {
        let name = state.tag_draft.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyTagName);
        }
        if state.tag_name_taken(name, state.editing_tag_id) {
            return Err(ValidationError::DuplicateTagName(name.to_string()));
        }
        let color = palette::normalize(&state.tag_draft.color)
            .ok_or_else(|| ValidationError::InvalidColor(state.tag_draft.color.clone()))?;
        Ok((name.to_string(), color))
    }

    pub fn save_tag(&self, state: &mut SessionState) -> Vec<Effect> {
        let key = state
            .editing_tag_id
            .map(EntityKey::Tag)
            .unwrap_or(EntityKey::NewTag);
        let _ticket = match self.acquire(key) {
            Ok(ticket) => ticket,
            Err(busy) => return busy,
        };
        let (name, color) = match self.validate_tag(state) {
            Ok(valid) => valid,
            Err(err) => return self.invalid(err),
        };

        let previous_filter = state.filter.clone();
        let previous_draft_tag = state.note_draft.tag_name.clone();
        match state.editing_tag_id {
            Some(id) => match self.store.update_tag(id, &name, &color) {
                Ok(update) => {
                    tracing::debug!(
                        id,
                        from = %update.previous_name,
                        to = %name,
                        relabeled = update.relabeled,
                        "tag updated"
                    );
                    if state.filter == Filter::Tag(update.previous_name.clone()) {
                        state.filter = Filter::Tag(name.clone());
                    }
                    if state.note_draft.tag_name == update.previous_name {
                        state.note_draft.tag_name = name;
                    }
                }
                Err(err) => return self.store_failure("update tag", err),
            },
            None => match self.store.create_tag(&name, &color) {
                Ok(tag) => tracing::debug!(id = tag.id, name = %tag.name, "tag created"),
                Err(err) => return self.store_failure("create tag", err),
            },
        }

        state.cancel_tag_edit();
        match self.try_reload(state) {
            Ok(effects) => effects,
            Err(alert) => {
                // the old tags are still loaded, so undo the rename follow-up
                state.filter = previous_filter;
                state.note_draft.tag_name = previous_draft_tag;
                state.repair_filter();
                alert
            }
        }
    }

    pub fn delete_tag(&self, state: &mut SessionState, id: i64) -> Vec<Effect> {
        let _ticket = match self.acquire(EntityKey::Tag(id)) {
            Ok(ticket) => ticket,
            Err(busy) => return busy,
        };
        if state.tags.len() <= 1 {
            return self.invalid(ValidationError::LastTag);
        }
        let Some(tag) = state.tag(id).cloned() else {
            return self.alert(self.messages.tag_not_found());
        };
        let Some(fallback) = state.fallback_tag(id).map(|tag| tag.name.clone()) else {
            return self.invalid(ValidationError::LastTag);
        };
        if !self.prompt.confirm(&self.messages.confirm_delete_tag(&tag.name)) {
            return Vec::new();
        }

        match self.store.delete_tag(id, Some(&fallback)) {
            Ok(relabeled) => {
                tracing::debug!(id, name = %tag.name, %fallback, relabeled, "tag deleted");
            }
            Err(err) => return self.store_failure("delete tag", err),
        }
        if state.filter == Filter::Tag(tag.name.clone()) {
            state.filter = Filter::All;
        }
        if state.editing_tag_id == Some(id) {
            state.cancel_tag_edit();
        }
        if state.note_draft.tag_name == tag.name {
            state.note_draft.tag_name = fallback;
        }
        self.reload(state)
    }

    /// Local only; an unknown tag shows everything.
    pub fn set_filter(&self, state: &mut SessionState, filter: Filter) -> Vec<Effect> {
        state.filter = match filter {
            Filter::Tag(name) if state.tag_by_name(&name).is_some() => Filter::Tag(name),
            Filter::Tag(name) => {
                tracing::debug!(tag = %name, "unknown filter tag, showing all notes");
                Filter::All
            }
            Filter::All => Filter::All,
        };
        vec![self.render(state)]
    }

    pub fn toggle_tag_panel(&self, state: &mut SessionState) -> Vec<Effect> {
        state.tag_panel_expanded = !state.tag_panel_expanded;
        vec![self.render(state)]
    }
}
