//! Declarative snapshot of what the front end should show. Built from
//! [`SessionState`] alone; never touches the store and never reorders.

use crate::app::messages::Messages;
use crate::app::state::{Filter, SessionState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Loading,
    Login,
    App { account: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Email,
    Password,
    NoteTitle,
    NoteText,
    NoteTag,
    TagName,
    TagColor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagOption {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSelect {
    pub options: Vec<TagOption>,
    pub selected: Option<String>,
    /// Shown instead of options when there is nothing to pick.
    pub placeholder: Option<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManageableTag {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub editing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOption {
    pub label: String,
    pub filter: Filter,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterMenu {
    pub label: String,
    pub options: Vec<FilterOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteCard {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub tag_name: String,
    pub color: String,
    pub created_label: String,
    pub editing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteList {
    Cards(Vec<NoteCard>),
    Empty(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub tag_select: TagSelect,
    pub manageable_tags: Vec<ManageableTag>,
    pub filter_menu: FilterMenu,
    pub notes: NoteList,
    pub tag_panel_expanded: bool,
    pub editing_note: bool,
    pub editing_tag: bool,
}

pub fn render_all(state: &SessionState, messages: &Messages) -> ViewModel {
    ViewModel {
        tag_select: tag_select(state, messages),
        manageable_tags: manageable_tags(state),
        filter_menu: filter_menu(state, messages),
        notes: note_list(state, messages),
        tag_panel_expanded: state.tag_panel_expanded,
        editing_note: state.editing_note_id.is_some(),
        editing_tag: state.editing_tag_id.is_some(),
    }
}

fn tag_select(state: &SessionState, messages: &Messages) -> TagSelect {
    if state.tags.is_empty() {
        return TagSelect {
            options: Vec::new(),
            selected: None,
            placeholder: Some(messages.no_tags().to_string()),
            enabled: false,
        };
    }
    TagSelect {
        options: state
            .tags
            .iter()
            .map(|tag| TagOption {
                name: tag.name.clone(),
                color: tag.color.clone(),
            })
            .collect(),
        selected: state.selected_tag().map(|tag| tag.name.clone()),
        placeholder: None,
        enabled: true,
    }
}

fn manageable_tags(state: &SessionState) -> Vec<ManageableTag> {
    state
        .tags
        .iter()
        .map(|tag| ManageableTag {
            id: tag.id,
            name: tag.name.clone(),
            color: tag.color.clone(),
            editing: state.editing_tag_id == Some(tag.id),
        })
        .collect()
}

fn filter_menu(state: &SessionState, messages: &Messages) -> FilterMenu {
    let mut options = Vec::with_capacity(state.tags.len() + 1);
    options.push(FilterOption {
        label: messages.all_notes().to_string(),
        filter: Filter::All,
        active: state.filter == Filter::All,
    });
    for tag in &state.tags {
        let filter = Filter::Tag(tag.name.clone());
        options.push(FilterOption {
            label: tag.name.clone(),
            active: state.filter == filter,
            filter,
        });
    }
    let label = match &state.filter {
        Filter::All => messages.all_notes().to_string(),
        Filter::Tag(name) => messages.filter_label(name),
    };
    FilterMenu { label, options }
}

fn note_list(state: &SessionState, messages: &Messages) -> NoteList {
    let cards: Vec<NoteCard> = state
        .visible_notes()
        .map(|note| NoteCard {
            id: note.id,
            title: if note.title.is_empty() {
                messages.untitled().to_string()
            } else {
                note.title.clone()
            },
            text: note.text.clone(),
            tag_name: note.tag_name.clone(),
            color: state.color_for(&note.tag_name).to_string(),
            created_label: messages.created_label(note.created_at),
            editing: state.editing_note_id == Some(note.id),
        })
        .collect();
    if !cards.is_empty() {
        return NoteList::Cards(cards);
    }
    match &state.filter {
        Filter::All => NoteList::Empty(messages.no_notes().to_string()),
        Filter::Tag(name) => NoteList::Empty(messages.no_notes_under(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::palette::FALLBACK_COLOR;
    use crate::config::Language;
    use crate::storage::{NoteRecord, TagRecord};
    use assert_matches::assert_matches;

    fn sample_state() -> SessionState {
        let tags = vec![
            TagRecord {
                id: 1,
                name: "Work".into(),
                color: "#3b82f6".into(),
                created_at: 1,
            },
            TagRecord {
                id: 2,
                name: "Personal".into(),
                color: "#ef4444".into(),
                created_at: 2,
            },
        ];
        let notes = vec![
            NoteRecord {
                id: 12,
                title: String::new(),
                text: "orphan".into(),
                tag_name: "Archived".into(),
                created_at: 30,
            },
            NoteRecord {
                id: 11,
                title: "Groceries".into(),
                text: "milk".into(),
                tag_name: "Personal".into(),
                created_at: 20,
            },
            NoteRecord {
                id: 10,
                title: "Standup".into(),
                text: "notes".into(),
                tag_name: "Work".into(),
                created_at: 10,
            },
        ];
        let mut state = SessionState::default();
        state.replace_data(notes, tags);
        state
    }

    fn card_ids(view: &ViewModel) -> Vec<i64> {
        match &view.notes {
            NoteList::Cards(cards) => cards.iter().map(|card| card.id).collect(),
            NoteList::Empty(_) => Vec::new(),
        }
    }

    #[test]
    fn all_filter_keeps_store_order_and_applies_defaults() {
        let state = sample_state();
        let view = render_all(&state, &Messages::default());
        assert_eq!(card_ids(&view), vec![12, 11, 10]);
        let NoteList::Cards(cards) = &view.notes else {
            panic!("expected cards");
        };
        assert_eq!(cards[0].title, "Untitled");
        assert_eq!(cards[0].color, FALLBACK_COLOR);
        assert_eq!(cards[1].color, "#ef4444");
        assert_eq!(view.filter_menu.label, "All notes");
    }

    #[test]
    fn rendered_set_matches_filter_predicate() {
        let mut state = sample_state();
        for name in ["Work", "Personal"] {
            state.filter = Filter::Tag(name.to_string());
            let view = render_all(&state, &Messages::default());
            let expected: Vec<i64> = state
                .notes
                .iter()
                .filter(|note| note.tag_name == name)
                .map(|note| note.id)
                .collect();
            assert_eq!(card_ids(&view), expected);
            assert_eq!(view.filter_menu.label, format!("Tag: {name}"));
            let active: Vec<&FilterOption> =
                view.filter_menu.options.iter().filter(|o| o.active).collect();
            assert_eq!(active.len(), 1);
            assert_eq!(active[0].label, name);
        }
    }

    #[test]
    fn empty_message_distinguishes_filtered_from_blank() {
        let mut state = sample_state();
        state.notes.retain(|note| note.tag_name != "Personal");
        state.filter = Filter::Tag("Personal".into());
        let view = render_all(&state, &Messages::default());
        assert_matches!(&view.notes, NoteList::Empty(msg) if msg == "No notes under tag \"Personal\".");

        let blank = SessionState::default();
        let view = render_all(&blank, &Messages::new(Language::Vi));
        assert_matches!(&view.notes, NoteList::Empty(msg) if msg == "Chưa có ghi chú nào.");
    }

    #[test]
    fn tag_select_disabled_without_tags() {
        let view = render_all(&SessionState::default(), &Messages::default());
        assert!(!view.tag_select.enabled);
        assert_eq!(view.tag_select.placeholder.as_deref(), Some("No tags"));
        assert_eq!(view.filter_menu.options.len(), 1);
    }

    #[test]
    fn edit_flags_mark_rows() {
        let mut state = sample_state();
        state.editing_note_id = Some(11);
        state.editing_tag_id = Some(2);
        state.note_draft.tag_name = "Personal".into();
        let view = render_all(&state, &Messages::default());
        assert!(view.editing_note);
        assert!(view.editing_tag);
        assert_eq!(view.tag_select.selected.as_deref(), Some("Personal"));
        let editing: Vec<i64> = view
            .manageable_tags
            .iter()
            .filter(|tag| tag.editing)
            .map(|tag| tag.id)
            .collect();
        assert_eq!(editing, vec![2]);
        let NoteList::Cards(cards) = &view.notes else {
            panic!("expected cards");
        };
        assert!(cards.iter().any(|card| card.id == 11 && card.editing));
    }
}
