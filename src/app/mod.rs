use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;

use crate::app::prompt::ModalPrompt;
use crate::app::state::{Caret, Filter, SessionState};
use crate::app::view::{render_all, FormField, NoteList, Screen, ViewModel};
use crate::config::palette;
use crate::ui;

pub mod commands;
pub mod guard;
pub mod messages;
pub mod prompt;
pub mod session;
pub mod state;
pub mod view;

pub use commands::{Effect, Handlers, ValidationError};
pub use messages::Messages;
pub use session::{SessionGate, StoreFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Notes,
    Compose,
    TagList,
    TagForm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    DeleteNote(i64),
    DeleteTag(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    Alert(String),
    Confirm {
        message: String,
        action: PendingAction,
    },
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub error: Option<String>,
}

/// Read-only view of the app handed to the renderer each frame.
pub struct UiModel<'a> {
    pub screen: &'a Screen,
    pub view: &'a ViewModel,
    pub state: &'a SessionState,
    pub login: &'a LoginForm,
    pub messages: &'a Messages,
    pub pane: Pane,
    pub field: FormField,
    pub caret_column: usize,
    pub tag_cursor: usize,
    pub modal: Option<&'a Modal>,
    pub status: Option<&'a str>,
}

pub struct App {
    gate: SessionGate,
    prompt: Arc<ModalPrompt>,
    view: ViewModel,
    login: LoginForm,
    pane: Pane,
    field: FormField,
    caret: Caret,
    list_state: ListState,
    tag_cursor: usize,
    modal: Option<Modal>,
    status: Option<String>,
    should_quit: bool,
    tick_rate: Duration,
}

const COMPOSE_FIELDS: [FormField; 3] = [
    FormField::NoteTitle,
    FormField::NoteText,
    FormField::NoteTag,
];
const TAG_FIELDS: [FormField; 2] = [FormField::TagName, FormField::TagColor];

fn plain(key: &KeyEvent) -> bool {
    !key.modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
}

impl App {
    pub fn new(gate: SessionGate) -> Self {
        let prompt = Arc::new(ModalPrompt::default());
        let gate = gate.with_prompt(prompt.clone());
        let view = render_all(gate.state(), gate.messages());
        let mut app = Self {
            gate,
            prompt,
            view,
            login: LoginForm::default(),
            pane: Pane::Notes,
            field: FormField::Email,
            caret: Caret::default(),
            list_state: ListState::default(),
            tag_cursor: 0,
            modal: None,
            status: None,
            should_quit: false,
            tick_rate: Duration::from_millis(250),
        };
        let effects = app.gate.pump();
        app.apply(effects);
        app
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            let caret_column = self.caret_column();
            terminal
                .draw(|frame| {
                    let model = UiModel {
                        screen: self.gate.screen(),
                        view: &self.view,
                        state: self.gate.state(),
                        login: &self.login,
                        messages: self.gate.messages(),
                        pane: self.pane,
                        field: self.field,
                        caret_column,
                        tag_cursor: self.tag_cursor,
                        modal: self.modal.as_ref(),
                        status: self.status.as_deref(),
                    };
                    ui::draw_app(frame, &model, &mut self.list_state);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                if let Event::Key(key) = event::read().context("reading terminal event")? {
                    self.handle_key(key);
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                let effects = self.gate.pump();
                self.apply(effects);
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    pub fn screen(&self) -> &Screen {
        self.gate.screen()
    }

    pub fn view(&self) -> &ViewModel {
        &self.view
    }

    pub fn modal(&self) -> Option<&Modal> {
        self.modal.as_ref()
    }

    pub fn pane(&self) -> Pane {
        self.pane
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn caret_column(&self) -> usize {
        self.field_text().map(|text| self.caret.column(text)).unwrap_or(0)
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Alert(message) => self.modal = Some(Modal::Alert(message)),
                Effect::Render(view) => {
                    self.view = view;
                    self.clamp_cursors();
                }
                Effect::ShowScreen(screen) => {
                    self.status = None;
                    match screen {
                        Screen::Login => {
                            self.login.password.clear();
                            self.focus_field(FormField::Email);
                        }
                        Screen::App { .. } => {
                            self.login = LoginForm::default();
                            self.pane = Pane::Notes;
                            self.list_state.select(Some(0));
                            self.tag_cursor = 0;
                        }
                        Screen::Loading => {}
                    }
                }
                Effect::Focus(field) => self.focus_field(field),
                Effect::Busy(key) => self.status = Some(self.gate.messages().busy(key)),
            }
        }
    }

    fn dispatch<F>(&mut self, f: F)
    where
        F: FnOnce(&Handlers, &mut SessionState) -> Vec<Effect>,
    {
        if let Some(effects) = self.gate.dispatch(f) {
            self.apply(effects);
        }
    }

    fn dispatch_pending(&mut self, action: PendingAction) {
        match action {
            PendingAction::DeleteNote(id) => {
                self.dispatch(|handlers, state| handlers.delete_note(state, id))
            }
            PendingAction::DeleteTag(id) => {
                self.dispatch(|handlers, state| handlers.delete_tag(state, id))
            }
        }
        // a re-run that bailed before confirming must not leave a yes behind
        self.prompt.discard_answer();
        if let Some(message) = self.prompt.take_pending() {
            self.modal = Some(Modal::Confirm { message, action });
        }
    }

    fn refresh_view(&mut self) {
        self.view = render_all(self.gate.state(), self.gate.messages());
        self.clamp_cursors();
    }

    fn clamp_cursors(&mut self) {
        let notes = match &self.view.notes {
            NoteList::Cards(cards) => cards.len(),
            NoteList::Empty(_) => 0,
        };
        let selected = self.list_state.selected().unwrap_or(0);
        self.list_state
            .select((notes > 0).then(|| selected.min(notes - 1)));
        let tags = self.view.manageable_tags.len();
        self.tag_cursor = self.tag_cursor.min(tags.saturating_sub(1));
    }

    fn focus_field(&mut self, field: FormField) {
        self.field = field;
        self.pane = match field {
            FormField::NoteTitle | FormField::NoteText | FormField::NoteTag => Pane::Compose,
            FormField::TagName | FormField::TagColor => Pane::TagForm,
            FormField::Email | FormField::Password => self.pane,
        };
        self.caret = self.field_text().map(Caret::at_end).unwrap_or_default();
    }

    fn field_text(&self) -> Option<&str> {
        let state = self.gate.state();
        match self.field {
            FormField::Email => Some(self.login.email.as_str()),
            FormField::Password => Some(self.login.password.as_str()),
            FormField::NoteTitle => Some(state.note_draft.title.as_str()),
            FormField::NoteText => Some(state.note_draft.text.as_str()),
            FormField::TagName => Some(state.tag_draft.name.as_str()),
            FormField::TagColor => Some(state.tag_draft.color.as_str()),
            FormField::NoteTag => None,
        }
    }

    fn edit_field<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Caret, &mut String),
    {
        let caret = &mut self.caret;
        let text = match self.field {
            FormField::Email => Some(&mut self.login.email),
            FormField::Password => Some(&mut self.login.password),
            FormField::NoteTitle => self.gate.state_mut().map(|s| &mut s.note_draft.title),
            FormField::NoteText => self.gate.state_mut().map(|s| &mut s.note_draft.text),
            FormField::TagName => self.gate.state_mut().map(|s| &mut s.tag_draft.name),
            FormField::TagColor => self.gate.state_mut().map(|s| &mut s.tag_draft.color),
            FormField::NoteTag => None,
        };
        if let Some(text) = text {
            f(caret, text);
        }
    }

    /// Cursor movement and typing shared by every text field.
    fn handle_text_key(&mut self, key: KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char(ch) if plain(&key) => {
                self.edit_field(|caret, text| caret.insert(text, ch))
            }
            KeyCode::Backspace => self.edit_field(|caret, text| {
                caret.backspace(text);
            }),
            KeyCode::Delete => self.edit_field(|caret, text| {
                caret.delete(text);
            }),
            KeyCode::Left if ctrl => self.edit_field(|caret, text| {
                caret.move_word_left(text);
            }),
            KeyCode::Right if ctrl => self.edit_field(|caret, text| {
                caret.move_word_right(text);
            }),
            KeyCode::Left => self.edit_field(|caret, text| {
                caret.move_left(text);
            }),
            KeyCode::Right => self.edit_field(|caret, text| {
                caret.move_right(text);
            }),
            KeyCode::Home => self.caret.move_home(),
            KeyCode::End => self.edit_field(|caret, text| caret.move_end(text)),
            _ => return false,
        }
        true
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }
        if self.modal.is_some() {
            self.handle_modal_key(key);
            return;
        }
        match self.gate.screen() {
            Screen::Login | Screen::Loading => self.handle_login_key(key),
            Screen::App { .. } => {
                match self.pane {
                    Pane::Notes => self.handle_notes_key(key),
                    Pane::Compose => self.handle_compose_key(key),
                    Pane::TagList => self.handle_tag_list_key(key),
                    Pane::TagForm => self.handle_tag_form_key(key),
                }
                let effects = self.gate.pump();
                self.apply(effects);
            }
        }
    }

    fn handle_modal_key(&mut self, key: KeyEvent) {
        let Some(modal) = self.modal.take() else {
            return;
        };
        match modal {
            Modal::Alert(message) => {
                if !matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                    self.modal = Some(Modal::Alert(message));
                }
            }
            Modal::Confirm { message, action } => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    self.prompt.answer_next(true);
                    self.dispatch_pending(action);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {}
                _ => self.modal = Some(Modal::Confirm { message, action }),
            },
        }
    }

    fn handle_login_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                let next = if self.field == FormField::Email {
                    FormField::Password
                } else {
                    FormField::Email
                };
                self.focus_field(next);
            }
            KeyCode::Enter => self.submit_login(false),
            KeyCode::Char('n') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.submit_login(true)
            }
            _ => {
                if !matches!(self.field, FormField::Email | FormField::Password) {
                    self.focus_field(FormField::Email);
                }
                self.handle_text_key(key);
            }
        }
    }

    fn submit_login(&mut self, register: bool) {
        let auth = Arc::clone(self.gate.auth());
        let result = if register {
            auth.sign_up(&self.login.email, &self.login.password)
        } else {
            auth.sign_in(&self.login.email, &self.login.password)
        };
        match result {
            Ok(user) => tracing::debug!(email = %user.email, register, "authenticated"),
            Err(err) => {
                tracing::warn!(code = %err.code, "authentication failed");
                self.login.error = Some(self.gate.messages().auth_error(&err));
                return;
            }
        }
        let effects = self.gate.pump();
        self.apply(effects);
    }

    fn sign_out(&mut self) {
        if let Err(err) = self.gate.auth().sign_out() {
            tracing::error!(?err, "sign out failed");
            self.status = Some(err.message);
            return;
        }
        let effects = self.gate.pump();
        self.apply(effects);
    }

    fn selected_note(&self) -> Option<i64> {
        let NoteList::Cards(cards) = &self.view.notes else {
            return None;
        };
        cards.get(self.list_state.selected()?).map(|card| card.id)
    }

    fn selected_tag(&self) -> Option<i64> {
        self.view
            .manageable_tags
            .get(self.tag_cursor)
            .map(|tag| tag.id)
    }

    fn move_note_selection(&mut self, delta: isize) {
        let len = match &self.view.notes {
            NoteList::Cards(cards) => cards.len(),
            NoteList::Empty(_) => 0,
        };
        if len == 0 {
            return;
        }
        let current = self.list_state.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, len as isize - 1);
        self.list_state.select(Some(next as usize));
    }

    fn cycle_filter(&mut self, step: isize) {
        let options = &self.view.filter_menu.options;
        if options.is_empty() {
            return;
        }
        let len = options.len() as isize;
        let active = options.iter().position(|option| option.active).unwrap_or(0) as isize;
        let filter = options[(active + step).rem_euclid(len) as usize].filter.clone();
        self.list_state.select(Some(0));
        self.dispatch(move |handlers, state| handlers.set_filter(state, filter));
    }

    fn handle_notes_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.move_note_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_note_selection(-1),
            KeyCode::Char('f') => self.cycle_filter(1),
            KeyCode::Char('F') => self.cycle_filter(-1),
            KeyCode::Char('a') | KeyCode::Char('n') | KeyCode::Tab => {
                self.focus_field(FormField::NoteTitle)
            }
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(id) = self.selected_note() {
                    self.dispatch(|handlers, state| handlers.begin_edit_note(state, id));
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.selected_note() {
                    self.dispatch_pending(PendingAction::DeleteNote(id));
                }
            }
            KeyCode::Char('t') => {
                self.dispatch(|handlers, state| handlers.toggle_tag_panel(state));
                if self.view.tag_panel_expanded {
                    self.pane = Pane::TagList;
                }
            }
            KeyCode::Char('g') if self.view.tag_panel_expanded => self.pane = Pane::TagList,
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.dispatch(|handlers, state| handlers.reload(state))
            }
            KeyCode::Char('L') => self.sign_out(),
            _ => {}
        }
    }

    fn step_field(&mut self, fields: &[FormField], step: isize) {
        let len = fields.len() as isize;
        let index = fields.iter().position(|f| *f == self.field).unwrap_or(0) as isize;
        self.focus_field(fields[(index + step).rem_euclid(len) as usize]);
    }

    fn handle_compose_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                if self.view.editing_note {
                    self.dispatch(|handlers, state| handlers.cancel_edit_note(state));
                }
                self.pane = Pane::Notes;
            }
            KeyCode::Enter => {
                self.dispatch(|handlers, state| handlers.save_note(state));
                if self.modal.is_none() && !self.view.editing_note {
                    self.focus_field(FormField::NoteTitle);
                }
            }
            KeyCode::Tab => self.step_field(&COMPOSE_FIELDS, 1),
            KeyCode::BackTab => self.step_field(&COMPOSE_FIELDS, -1),
            KeyCode::Left | KeyCode::Right if self.field == FormField::NoteTag => {
                let step = if key.code == KeyCode::Left { -1 } else { 1 };
                self.cycle_note_tag(step);
            }
            _ => {
                if self.handle_text_key(key) {
                    self.refresh_view();
                }
            }
        }
    }

    fn cycle_note_tag(&mut self, step: isize) {
        let options = &self.view.tag_select.options;
        if !self.view.tag_select.enabled || options.is_empty() {
            return;
        }
        let len = options.len() as isize;
        let current = self
            .view
            .tag_select
            .selected
            .as_ref()
            .and_then(|name| options.iter().position(|option| &option.name == name))
            .unwrap_or(0) as isize;
        let next = options[(current + step).rem_euclid(len) as usize].name.clone();
        if let Some(state) = self.gate.state_mut() {
            state.note_draft.tag_name = next;
        }
        self.refresh_view();
    }

    fn handle_tag_list_key(&mut self, key: KeyEvent) {
        let tags = self.view.manageable_tags.len();
        match key.code {
            KeyCode::Esc | KeyCode::Tab => self.pane = Pane::Notes,
            KeyCode::Char('j') | KeyCode::Down if tags > 0 => {
                self.tag_cursor = (self.tag_cursor + 1).min(tags - 1)
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.tag_cursor = self.tag_cursor.saturating_sub(1)
            }
            KeyCode::Char('n') | KeyCode::Char('a') => {
                if self.view.editing_tag {
                    self.dispatch(|handlers, state| handlers.cancel_edit_tag(state));
                }
                self.focus_field(FormField::TagName);
            }
            KeyCode::Char('e') | KeyCode::Enter => {
                if let Some(id) = self.selected_tag() {
                    self.dispatch(|handlers, state| handlers.begin_edit_tag(state, id));
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.selected_tag() {
                    self.dispatch_pending(PendingAction::DeleteTag(id));
                }
            }
            KeyCode::Char('t') => {
                self.dispatch(|handlers, state| handlers.toggle_tag_panel(state));
                self.pane = Pane::Notes;
            }
            KeyCode::Char('q') => self.should_quit = true,
            _ => {}
        }
    }

    fn handle_tag_form_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.dispatch(|handlers, state| handlers.cancel_edit_tag(state));
                self.pane = Pane::TagList;
            }
            KeyCode::Enter => {
                self.dispatch(|handlers, state| handlers.save_tag(state));
                if self.modal.is_none() {
                    self.pane = Pane::TagList;
                }
            }
            KeyCode::Tab => self.step_field(&TAG_FIELDS, 1),
            KeyCode::BackTab => self.step_field(&TAG_FIELDS, -1),
            KeyCode::Up | KeyCode::Down if self.field == FormField::TagColor => {
                let step = if key.code == KeyCode::Up { -1 } else { 1 };
                if let Some(state) = self.gate.state_mut() {
                    let next = palette::next_swatch(&state.tag_draft.color, step);
                    state.tag_draft.color = next.to_string();
                }
                self.focus_field(FormField::TagColor);
            }
            _ => {
                self.handle_text_key(key);
            }
        }
    }

    /// Active filter, for the header.
    pub fn filter(&self) -> &Filter {
        &self.gate.state().filter
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ScriptedAuth, User};
    use crate::storage::memory::MemoryStore;
    use crate::storage::{DataStore, StoreError};
    use assert_matches::assert_matches;

    fn app_with(store: Arc<MemoryStore>) -> (App, Arc<ScriptedAuth>) {
        let auth = Arc::new(ScriptedAuth::default());
        let shared = Arc::clone(&store);
        let factory: StoreFactory = Box::new(
            move |_user: &User| -> std::result::Result<Arc<dyn DataStore>, StoreError> {
                Ok(Arc::clone(&shared) as Arc<dyn DataStore>)
            },
        );
        let gate = SessionGate::new(auth.clone(), factory, Messages::default(), Vec::new());
        (App::new(gate), auth)
    }

    fn seeded() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::seeded(
            &[(1, "Work", "#3b82f6"), (2, "Personal", "#ef4444")],
            &[(10, "standup", "Work"), (11, "groceries", "Personal")],
        ))
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    fn signed_in(store: Arc<MemoryStore>) -> App {
        let (mut app, _auth) = app_with(store);
        type_text(&mut app, "a@example.com");
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "secret1");
        press(&mut app, KeyCode::Enter);
        app
    }

    #[test]
    fn login_form_signs_in_and_shows_notes() {
        let app = signed_in(seeded());
        assert_eq!(
            app.screen(),
            &Screen::App {
                account: "a@example.com".into()
            }
        );
        assert_matches!(&app.view().notes, NoteList::Cards(cards) if cards.len() == 2);
    }

    #[test]
    fn compose_enter_saves_and_blank_text_alerts() {
        let store = seeded();
        let mut app = signed_in(store.clone());
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.pane(), Pane::Compose);
        press(&mut app, KeyCode::Enter);
        assert_matches!(app.modal(), Some(Modal::Alert(msg)) if msg == "Note text cannot be empty.");
        press(&mut app, KeyCode::Esc);
        assert!(app.modal().is_none());

        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "buy milk");
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Enter);
        let created = store.notes().into_iter().find(|note| note.text == "buy milk");
        assert_eq!(created.map(|note| note.tag_name).as_deref(), Some("Personal"));
    }

    #[test]
    fn delete_asks_through_modal_before_mutating() {
        let store = seeded();
        let mut app = signed_in(store.clone());
        press(&mut app, KeyCode::Char('d'));
        assert_matches!(app.modal(), Some(Modal::Confirm { action: PendingAction::DeleteNote(10), .. }));
        assert_eq!(store.mutations(), 0);

        press(&mut app, KeyCode::Char('n'));
        assert!(app.modal().is_none());
        assert_eq!(store.notes().len(), 2);

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));
        assert!(app.modal().is_none());
        assert_eq!(store.notes().len(), 1);
    }

    #[test]
    fn confirmed_delete_of_a_vanished_note_does_not_confirm_the_next_one() {
        let store = seeded();
        let mut app = signed_in(store.clone());
        press(&mut app, KeyCode::Char('d'));
        assert_matches!(app.modal(), Some(Modal::Confirm { action: PendingAction::DeleteNote(10), .. }));

        // the note goes away before the user answers
        store.delete_note(10).expect("delete behind the app");
        app.dispatch(|handlers, state| handlers.reload(state));
        press(&mut app, KeyCode::Char('y'));
        assert_matches!(app.modal(), Some(Modal::Alert(msg)) if msg == "Error: could not find the note.");
        press(&mut app, KeyCode::Esc);

        press(&mut app, KeyCode::Char('d'));
        assert_matches!(app.modal(), Some(Modal::Confirm { action: PendingAction::DeleteNote(11), .. }));
        assert_eq!(store.notes().len(), 1);
    }

    #[test]
    fn filter_cycles_through_tags() {
        let mut app = signed_in(seeded());
        press(&mut app, KeyCode::Char('f'));
        assert_eq!(app.filter(), &Filter::Tag("Work".into()));
        assert_eq!(app.view().filter_menu.label, "Tag: Work");
        press(&mut app, KeyCode::Char('F'));
        assert_eq!(app.filter(), &Filter::All);
    }

    #[test]
    fn logout_returns_to_login() {
        let mut app = signed_in(seeded());
        press(&mut app, KeyCode::Char('L'));
        assert_eq!(app.screen(), &Screen::Login);
        assert_matches!(&app.view().notes, NoteList::Empty(_));
    }
}
