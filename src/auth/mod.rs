use std::fs;
use std::path::PathBuf;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::storage::{now_millis, StorageHandle, StoreError};

pub mod password;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum AuthErrorCode {
    MissingCredentials,
    WeakPassword,
    EmailAlreadyInUse,
    InvalidCredentials,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct AuthError {
    pub code: AuthErrorCode,
    pub message: String,
}

impl AuthError {
    pub fn new(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn internal(err: impl std::fmt::Display) -> Self {
        Self::new(AuthErrorCode::Internal, err.to_string())
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::internal(err)
    }
}

impl From<rusqlite::Error> for AuthError {
    fn from(err: rusqlite::Error) -> Self {
        AuthError::internal(err)
    }
}

/// Account provider. Subscribers receive the current state immediately and
/// then every sign-in/sign-out transition.
pub trait AuthService: Send + Sync {
    fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError>;

    fn sign_up(&self, email: &str, password: &str) -> Result<User, AuthError>;

    fn sign_out(&self) -> Result<(), AuthError>;

    fn current_user(&self) -> Option<User>;

    fn subscribe(&self) -> Receiver<Option<User>>;
}

/// Current user plus the channels listening for changes to it.
#[derive(Default)]
pub struct AuthBroadcast {
    current: Mutex<Option<User>>,
    subscribers: Mutex<Vec<Sender<Option<User>>>>,
}

impl AuthBroadcast {
    pub fn with_user(user: Option<User>) -> Self {
        Self {
            current: Mutex::new(user),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn current(&self) -> Option<User> {
        self.current.lock().clone()
    }

    pub fn subscribe(&self) -> Receiver<Option<User>> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let _ = tx.send(self.current());
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, user: Option<User>) {
        *self.current.lock() = user.clone();
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(user.clone()).is_ok());
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Accounts kept in the application database; the signed-in session is
/// remembered in a small JSON file so separate CLI runs share it.
pub struct LocalAuth {
    storage: StorageHandle,
    session_file: Option<PathBuf>,
    broadcast: AuthBroadcast,
}

impl LocalAuth {
    pub fn new(storage: StorageHandle, session_file: Option<PathBuf>) -> Self {
        let restored = session_file
            .as_deref()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|raw| serde_json::from_str::<User>(&raw).ok())
            .filter(|user| match Self::user_exists(&storage, &user.id) {
                Ok(exists) => exists,
                Err(err) => {
                    tracing::warn!(?err, "could not verify remembered session");
                    false
                }
            });
        if let Some(user) = &restored {
            tracing::debug!(email = %user.email, "restored remembered session");
        }
        Self {
            storage,
            session_file,
            broadcast: AuthBroadcast::with_user(restored),
        }
    }

    fn user_exists(storage: &StorageHandle, id: &str) -> Result<bool, StoreError> {
        storage.with_connection(|conn| {
            Ok(conn
                .query_row("SELECT 1 FROM users WHERE id = ?1", params![id], |_| Ok(()))
                .optional()?
                .is_some())
        })
    }

    fn remember(&self, user: Option<&User>) {
        let Some(path) = self.session_file.as_deref() else {
            return;
        };
        let result = match user {
            Some(user) => serde_json::to_string(user)
                .map_err(std::io::Error::from)
                .and_then(|encoded| {
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(path, encoded)
                }),
            None if path.exists() => fs::remove_file(path),
            None => Ok(()),
        };
        if let Err(err) = result {
            tracing::warn!(?err, path = %path.display(), "failed to persist session");
        }
    }

    fn establish(&self, user: User) -> User {
        self.remember(Some(&user));
        self.broadcast.publish(Some(user.clone()));
        user
    }
}

fn require_credentials(email: &str, password: &str) -> Result<String, AuthError> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::new(
            AuthErrorCode::MissingCredentials,
            "email and password are required",
        ));
    }
    Ok(email)
}

impl AuthService for LocalAuth {
    fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = require_credentials(email, password)?;
        let account = self.storage.with_connection(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, email, password_hash FROM users WHERE email = ?1",
                    params![email],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?)
        })?;
        let invalid = || {
            AuthError::new(
                AuthErrorCode::InvalidCredentials,
                "email or password is incorrect",
            )
        };
        let (id, email, hash) = account.ok_or_else(invalid)?;
        if !password::verify_password(password, &hash).map_err(AuthError::internal)? {
            return Err(invalid());
        }
        tracing::info!(%email, "signed in");
        Ok(self.establish(User { id, email }))
    }

    fn sign_up(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = require_credentials(email, password)?;
        if !password::is_strong_enough(password) {
            return Err(AuthError::new(
                AuthErrorCode::WeakPassword,
                format!(
                    "password must be at least {} characters",
                    password::MIN_PASSWORD_LEN
                ),
            ));
        }
        let hash = password::hash_password(password).map_err(AuthError::internal)?;
        let id = uuid::Uuid::new_v4().to_string();
        let inserted = self.storage.with_connection(|conn| {
            Ok(conn.execute(
                "INSERT INTO users (id, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, email, hash, now_millis()],
            )?)
        });
        match inserted {
            Ok(_) => {}
            Err(StoreError::Conflict(_)) => {
                return Err(AuthError::new(
                    AuthErrorCode::EmailAlreadyInUse,
                    format!("{email} is already registered"),
                ))
            }
            Err(err) => return Err(err.into()),
        }
        tracing::info!(%email, "registered account");
        Ok(self.establish(User { id, email }))
    }

    fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(user) = self.broadcast.current() {
            tracing::info!(email = %user.email, "signed out");
        }
        self.remember(None);
        self.broadcast.publish(None);
        Ok(())
    }

    fn current_user(&self) -> Option<User> {
        self.broadcast.current()
    }

    fn subscribe(&self) -> Receiver<Option<User>> {
        self.broadcast.subscribe()
    }
}

/// Test double whose transitions are driven directly by the test.
#[cfg(test)]
#[derive(Default)]
pub struct ScriptedAuth {
    broadcast: AuthBroadcast,
}

#[cfg(test)]
impl ScriptedAuth {
    pub fn set_user(&self, user: Option<User>) {
        self.broadcast.publish(user);
    }
}

#[cfg(test)]
impl AuthService for ScriptedAuth {
    fn sign_in(&self, email: &str, _password: &str) -> Result<User, AuthError> {
        let user = User {
            id: format!("id-{email}"),
            email: email.to_string(),
        };
        self.broadcast.publish(Some(user.clone()));
        Ok(user)
    }

    fn sign_up(&self, email: &str, password: &str) -> Result<User, AuthError> {
        self.sign_in(email, password)
    }

    fn sign_out(&self) -> Result<(), AuthError> {
        self.broadcast.publish(None);
        Ok(())
    }

    fn current_user(&self) -> Option<User> {
        self.broadcast.current()
    }

    fn subscribe(&self) -> Receiver<Option<User>> {
        self.broadcast.subscribe()
    }
}
