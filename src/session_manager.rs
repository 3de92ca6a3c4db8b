use crate::{
    log_util::{log_debug, log_warn},
    models::{ScoreRecord, User},
    output_manager::OutputManager,
};
use rusqlite::{Connection, OptionalExtension, params};
use std::{
    fs,
    path::Path,
    sync::{Arc, Mutex},
};
use thiserror::Error;

/// Fixed key holding the serialized user aggregate.
pub const USER_STORAGE_KEY: &str = "hsk_user";

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Connection(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Login form validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoginError {
    #[error("nama wajib diisi")]
    MissingName,
    #[error("email wajib diisi")]
    MissingEmail,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    Login(#[from] LoginError),
    #[error("no user is signed in")]
    NotSignedIn,
    /// The stored session was removed by another writer; the record was kept in memory only.
    #[error("the saved session was signed out elsewhere; this score was not saved")]
    SignedOutElsewhere,
    /// The in-memory session was updated but could not be persisted.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Durable home of the user aggregate. Every write replaces the whole value.
pub trait UserStore {
    fn load(&self) -> Result<Option<User>, StorageError>;
    fn save(&self, user: &User) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

/// Single-table key/value store in SQLite.
#[derive(Debug)]
pub struct SqliteUserStore {
    connection: Connection,
}

impl SqliteUserStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let path = OutputManager::resolve(path).map_err(StorageError::Connection)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                StorageError::Connection(format!(
                    "failed to create storage directory {}: {}",
                    parent.display(),
                    err
                ))
            })?;
        }
        let connection = Connection::open(&path)?;
        initialize_schema(&connection)?;
        Ok(Self { connection })
    }

    fn read_value(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .connection
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }
}

fn initialize_schema(connection: &Connection) -> Result<(), StorageError> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;
    Ok(())
}

impl UserStore for SqliteUserStore {
    fn load(&self) -> Result<Option<User>, StorageError> {
        match self.read_value(USER_STORAGE_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, user: &User) -> Result<(), StorageError> {
        let serialized = serde_json::to_string(user)?;
        self.connection.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![USER_STORAGE_KEY, serialized],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.connection
            .execute("DELETE FROM kv_store WHERE key = ?1", params![USER_STORAGE_KEY])?;
        Ok(())
    }
}

/// In-process store holding the serialized JSON, shareable across managers.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    value: Arc<Mutex<Option<String>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self) -> Option<String> {
        self.value.lock().map(|guard| guard.clone()).unwrap_or(None)
    }

    pub fn set_raw(&self, raw: Option<String>) {
        if let Ok(mut guard) = self.value.lock() {
            *guard = raw;
        }
    }
}

impl UserStore for MemoryUserStore {
    fn load(&self) -> Result<Option<User>, StorageError> {
        match self.raw() {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, user: &User) -> Result<(), StorageError> {
        self.set_raw(Some(serde_json::to_string(user)?));
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.set_raw(None);
        Ok(())
    }
}

/// Owns the signed-in user and is the only writer to the [`UserStore`].
pub struct SessionManager {
    store: Box<dyn UserStore>,
    user: Option<User>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(store: Box<dyn UserStore>) -> Self {
        Self { store, user: None }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Load a previously persisted session. Undecodable data leaves the app signed out.
    pub fn restore(&mut self) -> Result<bool, StorageError> {
        match self.store.load() {
            Ok(user) => {
                if let Some(user) = &user {
                    log_debug(&format!(
                        "SessionManager: restored session for {} with {} score(s)",
                        user.id,
                        user.scores.len()
                    ));
                }
                self.user = user;
                Ok(self.user.is_some())
            }
            Err(err) => {
                self.user = None;
                log_warn(&format!("SessionManager: failed to restore session: {}", err));
                Err(err)
            }
        }
    }

    pub fn login(&mut self, name: &str, email: &str) -> Result<&User, SessionError> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() {
            return Err(LoginError::MissingName.into());
        }
        if email.is_empty() {
            return Err(LoginError::MissingEmail.into());
        }

        let user = User::new(name, email);
        log_debug(&format!("SessionManager: signed in {} as {}", email, user.id));
        let saved = self.store.save(&user);
        let user = self.user.insert(user);
        saved?;
        Ok(user)
    }

    pub fn logout(&mut self) -> Result<(), StorageError> {
        if let Some(user) = self.user.take() {
            log_debug(&format!("SessionManager: signed out {}", user.id));
        }
        self.store.clear()
    }

    /// Prepend a finished quiz to the history and persist the whole user.
    pub fn record_score(&mut self, record: ScoreRecord) -> Result<(), SessionError> {
        let Some(user) = self.user.as_mut() else {
            return Err(SessionError::NotSignedIn);
        };

        let mut persist = true;
        match self.store.load() {
            Ok(Some(persisted)) if persisted.id == user.id => user.scores = persisted.scores,
            Ok(Some(_)) => {}
            Ok(None) => {
                log_warn(&format!(
                    "SessionManager: stored session for {} was cleared externally; not re-saving",
                    user.id
                ));
                persist = false;
            }
            Err(err) => log_warn(&format!(
                "SessionManager: could not reconcile persisted history: {}",
                err
            )),
        }

        log_debug(&format!(
            "SessionManager: recorded {} HSK {} score {}/{}",
            record.mode.label(),
            record.level,
            record.score,
            record.total
        ));
        user.scores.insert(0, record);
        if !persist {
            return Err(SessionError::SignedOutElsewhere);
        }
        log_debug(&format!("Sending score to {}...", user.email));
        self.store.save(user)?;
        Ok(())
    }
}
