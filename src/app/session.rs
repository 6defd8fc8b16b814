use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::app::commands::{Effect, Handlers};
use crate::app::guard::InFlight;
use crate::app::messages::Messages;
use crate::app::prompt::{Prompt, StdinPrompt};
use crate::app::state::SessionState;
use crate::app::view::{render_all, Screen};
use crate::auth::{AuthService, User};
use crate::config::DefaultTag;
use crate::storage::{DataStore, StoreError};

/// Builds the data store for a freshly authenticated account.
pub type StoreFactory =
    Box<dyn Fn(&User) -> Result<Arc<dyn DataStore>, StoreError> + Send + Sync>;

struct Workspace {
    user: User,
    store: Arc<dyn DataStore>,
}

/// Owns the per-account session: reacts to sign-in/sign-out, holds the local
/// state and hands out [`Handlers`] only while someone is signed in.
pub struct SessionGate {
    auth: Arc<dyn AuthService>,
    events: Receiver<Option<User>>,
    factory: StoreFactory,
    prompt: Arc<dyn Prompt>,
    messages: Messages,
    defaults: Vec<DefaultTag>,
    in_flight: InFlight,
    workspace: Option<Workspace>,
    screen: Screen,
    state: SessionState,
}

impl SessionGate {
    pub fn new(
        auth: Arc<dyn AuthService>,
        factory: StoreFactory,
        messages: Messages,
        defaults: Vec<DefaultTag>,
    ) -> Self {
        let events = auth.subscribe();
        Self {
            auth,
            events,
            factory,
            prompt: Arc::new(StdinPrompt::default()),
            messages,
            defaults,
            in_flight: InFlight::default(),
            workspace: None,
            screen: Screen::Loading,
            state: SessionState::default(),
        }
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn Prompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_fallback_color(mut self, color: &str) -> Self {
        self.state = SessionState::new(color);
        self
    }

    pub fn auth(&self) -> &Arc<dyn AuthService> {
        &self.auth
    }

    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn user(&self) -> Option<&User> {
        self.workspace.as_ref().map(|workspace| &workspace.user)
    }

    /// Handles every auth transition queued since the last call.
    pub fn pump(&mut self) -> Vec<Effect> {
        let pending: Vec<Option<User>> = self.events.try_iter().collect();
        pending
            .into_iter()
            .flat_map(|change| self.on_auth_change(change))
            .collect()
    }

    pub fn on_auth_change(&mut self, user: Option<User>) -> Vec<Effect> {
        match user {
            Some(user) => self.sign_in(user),
            None => self.sign_out(),
        }
    }

    fn sign_in(&mut self, user: User) -> Vec<Effect> {
        if self.user().map(|loaded| loaded.id.as_str()) == Some(user.id.as_str()) {
            tracing::debug!(email = %user.email, "account already loaded");
            return Vec::new();
        }
        self.load_account(user)
    }

    fn load_account(&mut self, user: User) -> Vec<Effect> {
        self.state.clear();
        self.screen = Screen::App {
            account: user.email.clone(),
        };
        let mut effects = vec![Effect::ShowScreen(self.screen.clone())];

        let store = match (self.factory)(&user) {
            Ok(store) => store,
            Err(err) => {
                tracing::error!(?err, email = %user.email, "could not open account store");
                self.workspace = None;
                effects.push(Effect::Alert(self.messages.load_failed(&err)));
                effects.push(Effect::Render(render_all(&self.state, &self.messages)));
                return effects;
            }
        };
        tracing::info!(email = %user.email, "account session started");
        self.workspace = Some(Workspace { user, store });

        let Some(handlers) = self.workspace() else {
            return effects;
        };
        let defaults: Vec<(String, String)> = self
            .defaults
            .iter()
            .map(|tag| (tag.name.clone(), tag.color.clone()))
            .collect();
        let mut reloaded = handlers.reload(&mut self.state);
        let loaded = !reloaded
            .iter()
            .any(|effect| matches!(effect, Effect::Alert(_)));
        if loaded && self.state.tags.is_empty() {
            match handlers.seed_tags(&self.state, &defaults) {
                Ok(0) => {}
                Ok(_) => reloaded = handlers.reload(&mut self.state),
                Err(err) => {
                    tracing::error!(?err, "seeding default tags failed");
                    effects.push(Effect::Alert(self.messages.load_failed(&err)));
                    reloaded = handlers.reload(&mut self.state);
                }
            }
        }
        if reloaded.iter().any(|effect| matches!(effect, Effect::Alert(_))) {
            effects.push(Effect::Render(render_all(&self.state, &self.messages)));
        }
        effects.extend(reloaded);
        effects
    }

    fn sign_out(&mut self) -> Vec<Effect> {
        if let Some(workspace) = self.workspace.take() {
            tracing::info!(email = %workspace.user.email, "account session ended");
        }
        self.state.clear();
        self.screen = Screen::Login;
        vec![
            Effect::ShowScreen(Screen::Login),
            Effect::Render(render_all(&self.state, &self.messages)),
        ]
    }

    /// Handlers for the signed-in account; `None` on the login screen.
    pub fn workspace(&self) -> Option<Handlers> {
        let workspace = self.workspace.as_ref()?;
        Some(Handlers::new(
            Arc::clone(&workspace.store),
            Arc::clone(&self.prompt),
            self.in_flight.clone(),
            self.messages,
        ))
    }

    /// Runs `f` against the signed-in account's handlers and state.
    pub fn dispatch<F>(&mut self, f: F) -> Option<Vec<Effect>>
    where
        F: FnOnce(&Handlers, &mut SessionState) -> Vec<Effect>,
    {
        let handlers = self.workspace()?;
        Some(f(&handlers, &mut self.state))
    }

    pub fn state_mut(&mut self) -> Option<&mut SessionState> {
        self.workspace.as_ref()?;
        Some(&mut self.state)
    }
}
