use unicode_segmentation::UnicodeSegmentation;

use crate::config::palette::{FALLBACK_COLOR, SWATCHES};
use crate::storage::{NoteRecord, TagRecord};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    All,
    /// Exact tag name; only ever set to a name present in `tags`.
    Tag(String),
}

impl Filter {
    pub fn matches(&self, note: &NoteRecord) -> bool {
        match self {
            Filter::All => true,
            Filter::Tag(name) => note.tag_name == *name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NoteDraft {
    pub title: String,
    pub text: String,
    /// Selected tag; empty or unknown resolves to the first tag.
    pub tag_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDraft {
    pub name: String,
    pub color: String,
}

impl Default for TagDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            color: SWATCHES[0].to_string(),
        }
    }
}

/// Everything one signed-in account sees. Replaced wholesale on reload and
/// cleared on sign-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub notes: Vec<NoteRecord>,
    pub tags: Vec<TagRecord>,
    pub filter: Filter,
    pub editing_note_id: Option<i64>,
    pub editing_tag_id: Option<i64>,
    pub note_draft: NoteDraft,
    pub tag_draft: TagDraft,
    pub tag_panel_expanded: bool,
    fallback_color: String,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(FALLBACK_COLOR)
    }
}

impl SessionState {
    pub fn new(fallback_color: &str) -> Self {
        Self {
            notes: Vec::new(),
            tags: Vec::new(),
            filter: Filter::All,
            editing_note_id: None,
            editing_tag_id: None,
            note_draft: NoteDraft::default(),
            tag_draft: TagDraft::default(),
            tag_panel_expanded: false,
            fallback_color: fallback_color.to_string(),
        }
    }

    pub fn fallback_color(&self) -> &str {
        &self.fallback_color
    }

    /// Drops every account-specific field, keeping display settings.
    pub fn clear(&mut self) {
        *self = Self::new(&self.fallback_color);
    }

    /// Installs freshly loaded data. Nothing from the previous snapshot is
    /// merged; pointers to rows that vanished are dropped with their drafts.
    pub fn replace_data(&mut self, notes: Vec<NoteRecord>, tags: Vec<TagRecord>) {
        self.notes = notes;
        self.tags = tags;
        self.repair_filter();
        if let Some(id) = self.editing_note_id {
            if self.note(id).is_none() {
                self.cancel_note_edit();
            }
        }
        if let Some(id) = self.editing_tag_id {
            if self.tag(id).is_none() {
                self.cancel_tag_edit();
            }
        }
    }

    pub fn repair_filter(&mut self) {
        if let Filter::Tag(name) = &self.filter {
            if self.tag_by_name(name).is_none() {
                tracing::debug!(tag = %name, "filter tag vanished, showing all notes");
                self.filter = Filter::All;
            }
        }
    }

    pub fn note(&self, id: i64) -> Option<&NoteRecord> {
        self.notes.iter().find(|note| note.id == id)
    }

    pub fn tag(&self, id: i64) -> Option<&TagRecord> {
        self.tags.iter().find(|tag| tag.id == id)
    }

    pub fn tag_by_name(&self, name: &str) -> Option<&TagRecord> {
        self.tags.iter().find(|tag| tag.name == name)
    }

    /// Case-insensitive clash with any tag other than `except`.
    pub fn tag_name_taken(&self, name: &str, except: Option<i64>) -> bool {
        let lowered = name.to_lowercase();
        self.tags
            .iter()
            .any(|tag| tag.name.to_lowercase() == lowered && Some(tag.id) != except)
    }

    pub fn color_for(&self, tag_name: &str) -> &str {
        self.tag_by_name(tag_name)
            .map(|tag| tag.color.as_str())
            .unwrap_or(&self.fallback_color)
    }

    pub fn visible_notes(&self) -> impl Iterator<Item = &NoteRecord> {
        self.notes.iter().filter(|note| self.filter.matches(note))
    }

    /// Tag a saved note will carry: the draft's choice when it still exists,
    /// else the first tag.
    pub fn selected_tag(&self) -> Option<&TagRecord> {
        self.tag_by_name(&self.note_draft.tag_name)
            .or_else(|| self.tags.first())
    }

    /// Where notes of a deleted tag are moved: the oldest remaining tag.
    pub fn fallback_tag(&self, deleted_id: i64) -> Option<&TagRecord> {
        self.tags.iter().find(|tag| tag.id != deleted_id)
    }

    pub fn cancel_note_edit(&mut self) {
        self.editing_note_id = None;
        self.note_draft = NoteDraft::default();
    }

    pub fn cancel_tag_edit(&mut self) {
        self.editing_tag_id = None;
        self.tag_draft = TagDraft::default();
    }
}

/// Cursor over a single-line form field. Positions are byte offsets kept on
/// grapheme boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Caret {
    pub position: usize,
}

impl Caret {
    pub fn at_end(text: &str) -> Self {
        Self {
            position: text.len(),
        }
    }

    fn clamp(&mut self, text: &str) {
        if self.position > text.len() {
            self.position = text.len();
        }
    }

    pub fn insert(&mut self, text: &mut String, ch: char) {
        self.clamp(text);
        text.insert(self.position, ch);
        self.position += ch.len_utf8();
    }

    pub fn backspace(&mut self, text: &mut String) -> bool {
        self.clamp(text);
        if self.position == 0 {
            return false;
        }
        let prev = prev_grapheme_boundary(text, self.position);
        text.drain(prev..self.position);
        self.position = prev;
        true
    }

    pub fn delete(&mut self, text: &mut String) -> bool {
        self.clamp(text);
        let next = next_grapheme_boundary(text, self.position);
        if next == self.position {
            return false;
        }
        text.drain(self.position..next);
        true
    }

    pub fn move_left(&mut self, text: &str) -> bool {
        self.clamp(text);
        if self.position == 0 {
            return false;
        }
        self.position = prev_grapheme_boundary(text, self.position);
        true
    }

    pub fn move_right(&mut self, text: &str) -> bool {
        self.clamp(text);
        let next = next_grapheme_boundary(text, self.position);
        if next == self.position {
            return false;
        }
        self.position = next;
        true
    }

    pub fn move_home(&mut self) {
        self.position = 0;
    }

    pub fn move_end(&mut self, text: &str) {
        self.position = text.len();
    }

    pub fn move_word_left(&mut self, text: &str) -> bool {
        self.clamp(text);
        let mut idx = self.position;
        while idx > 0 {
            let prev = prev_grapheme_boundary(text, idx);
            if text[prev..idx].trim().is_empty() {
                idx = prev;
            } else {
                break;
            }
        }
        while idx > 0 {
            let prev = prev_grapheme_boundary(text, idx);
            if text[prev..idx].trim().is_empty() {
                break;
            }
            idx = prev;
        }
        let moved = idx != self.position;
        self.position = idx;
        moved
    }

    pub fn move_word_right(&mut self, text: &str) -> bool {
        self.clamp(text);
        let len = text.len();
        let mut idx = self.position;
        while idx < len {
            let next = next_grapheme_boundary(text, idx);
            if text[idx..next].trim().is_empty() {
                break;
            }
            idx = next;
        }
        while idx < len {
            let next = next_grapheme_boundary(text, idx);
            if text[idx..next].trim().is_empty() {
                idx = next;
            } else {
                break;
            }
        }
        let moved = idx != self.position;
        self.position = idx;
        moved
    }

    /// Display column of the caret, in graphemes.
    pub fn column(&self, text: &str) -> usize {
        let end = self.position.min(text.len());
        text[..end].graphemes(true).count()
    }
}

fn prev_grapheme_boundary(text: &str, cursor: usize) -> usize {
    text[..cursor]
        .grapheme_indices(true)
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_grapheme_boundary(text: &str, cursor: usize) -> usize {
    text[cursor..]
        .graphemes(true)
        .next()
        .map(|grapheme| cursor + grapheme.len())
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(id: i64, name: &str) -> TagRecord {
        TagRecord {
            id,
            name: name.to_string(),
            color: "#3b82f6".to_string(),
            created_at: id,
        }
    }

    fn note(id: i64, tag_name: &str) -> NoteRecord {
        NoteRecord {
            id,
            title: String::new(),
            text: format!("note {id}"),
            tag_name: tag_name.to_string(),
            created_at: 100 - id,
        }
    }

    #[test]
    fn replace_data_resets_filter_when_tag_vanishes() {
        let mut state = SessionState::default();
        state.replace_data(vec![note(10, "Work")], vec![tag(1, "Work"), tag(2, "Home")]);
        state.filter = Filter::Tag("Home".into());

        state.replace_data(vec![note(10, "Work")], vec![tag(1, "Work")]);
        assert_eq!(state.filter, Filter::All);
    }

    #[test]
    fn replace_data_drops_pointers_to_missing_rows() {
        let mut state = SessionState::default();
        state.replace_data(vec![note(10, "Work")], vec![tag(1, "Work"), tag(2, "Home")]);
        state.editing_note_id = Some(10);
        state.note_draft.text = "draft".into();
        state.editing_tag_id = Some(2);
        state.tag_draft.name = "Home".into();

        state.replace_data(vec![], vec![tag(1, "Work")]);
        assert_eq!(state.editing_note_id, None);
        assert_eq!(state.note_draft, NoteDraft::default());
        assert_eq!(state.editing_tag_id, None);
        assert_eq!(state.tag_draft, TagDraft::default());
    }

    #[test]
    fn visible_notes_use_exact_tag_match() {
        let mut state = SessionState::default();
        state.replace_data(
            vec![note(1, "Work"), note(2, "work"), note(3, "Home"), note(4, "Work")],
            vec![tag(1, "Work"), tag(2, "work"), tag(3, "Home")],
        );
        state.filter = Filter::Tag("Work".into());
        let ids: Vec<i64> = state.visible_notes().map(|note| note.id).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn selection_and_fallback_follow_tag_order() {
        let mut state = SessionState::default();
        state.replace_data(vec![], vec![tag(1, "Work"), tag(2, "Home")]);
        assert_eq!(state.selected_tag().map(|t| t.id), Some(1));
        state.note_draft.tag_name = "Home".into();
        assert_eq!(state.selected_tag().map(|t| t.id), Some(2));
        state.note_draft.tag_name = "Gone".into();
        assert_eq!(state.selected_tag().map(|t| t.id), Some(1));

        assert_eq!(state.fallback_tag(1).map(|t| t.id), Some(2));
        assert_eq!(state.fallback_tag(2).map(|t| t.id), Some(1));
        assert!(state.tag_name_taken("HOME", None));
        assert!(!state.tag_name_taken("HOME", Some(2)));
    }

    #[test]
    fn clear_keeps_display_settings() {
        let mut state = SessionState::new("#123456");
        state.replace_data(vec![note(1, "Gone")], vec![tag(1, "Work")]);
        state.tag_panel_expanded = true;
        state.clear();
        assert!(state.notes.is_empty());
        assert!(!state.tag_panel_expanded);
        assert_eq!(state.color_for("Gone"), "#123456");
    }

    #[test]
    fn caret_edits_by_grapheme() {
        let mut text = "ghi chú".to_string();
        let mut caret = Caret::at_end(&text);
        assert!(caret.backspace(&mut text));
        assert_eq!(text, "ghi ch");
        caret.insert(&mut text, 'ú');
        assert_eq!(text, "ghi chú");
        assert!(caret.move_word_left(&text));
        assert_eq!(caret.column(&text), 4);
        assert!(caret.move_word_left(&text));
        assert_eq!(caret.position, 0);
        assert!(caret.move_word_right(&text));
        assert_eq!(caret.column(&text), 4);
        assert!(caret.delete(&mut text));
        assert_eq!(text, "ghi hú");
    }
}
