//!
//! authgate credential store
//! -------------------------
//! User records (email + Argon2 PHC hash) and the `CredentialStore` trait the login
//! strategy reads from. The bundled implementation, `FileUserStore`, keeps all users in
//! memory and mirrors them to a single JSON file under the database root.
//!
//! Emails are exact, case-sensitive keys. Opening the store is the boot-time sync:
//! the root folder and an empty users file are created when missing.

use std::{collections::HashMap, fs, path::{Path, PathBuf}, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::security;

const USERS_FILE: &str = "users.json";

/// A stored user. Read-only from the login flow's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Compare a plaintext candidate against the stored hash.
    pub fn valid_password(&self, candidate: &str) -> bool {
        security::verify_password(&self.password_hash, candidate)
    }
}

/// Input for provisioning a user; the password is hashed on insert.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("credential store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential store file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("a user with email {0} already exists")]
    DuplicateEmail(String),

    #[error("invalid user input: {0}")]
    InvalidInput(String),

    #[error("password hashing failed: {0}")]
    Hash(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Exact-match lookup by email.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Provision a new user.
    async fn insert(&self, user: NewUser) -> StoreResult<User>;
}

/// JSON-file backed credential store.
#[derive(Clone)]
pub struct FileUserStore {
    path: PathBuf,
    users: Arc<RwLock<HashMap<String, User>>>,
    // orders snapshot writes; held across the blocking file write, never the map lock
    persist: Arc<tokio::sync::Mutex<()>>,
}

impl FileUserStore {
    /// Open (or initialise) the store rooted at `db_root`.
    pub fn open<P: AsRef<Path>>(db_root: P) -> StoreResult<Self> {
        let root = db_root.as_ref();
        fs::create_dir_all(root)?;
        let path = root.join(USERS_FILE);
        let users = if path.exists() {
            let raw = fs::read(&path)?;
            let list: Vec<User> = if raw.iter().all(|b| b.is_ascii_whitespace()) {
                Vec::new()
            } else {
                serde_json::from_slice(&raw)?
            };
            let mut map = HashMap::with_capacity(list.len());
            for u in list {
                if map.contains_key(&u.email) {
                    return Err(StoreError::DuplicateEmail(u.email));
                }
                map.insert(u.email.clone(), u);
            }
            map
        } else {
            write_users(&path, Vec::new())?;
            HashMap::new()
        };
        info!(path = %path.display(), users = users.len(), "credential store ready");
        Ok(Self { path, users: Arc::new(RwLock::new(users)), persist: Arc::new(tokio::sync::Mutex::new(())) })
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn len(&self) -> usize { self.users.read().len() }

    pub fn is_empty(&self) -> bool { self.users.read().is_empty() }
}

fn write_users(path: &Path, mut list: Vec<User>) -> StoreResult<()> {
    list.sort_by(|a, b| a.email.cmp(&b.email));
    let bytes = serde_json::to_vec_pretty(&list)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl CredentialStore for FileUserStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users.read().get(email).cloned())
    }

    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        if user.email.trim().is_empty() {
            return Err(StoreError::InvalidInput("email must not be empty".into()));
        }
        if user.password.is_empty() {
            return Err(StoreError::InvalidInput("password must not be empty".into()));
        }
        if self.users.read().contains_key(&user.email) {
            return Err(StoreError::DuplicateEmail(user.email));
        }
        let password = user.password;
        let hash = tokio::task::spawn_blocking(move || security::hash_password(&password))
            .await
            .map_err(|e| StoreError::Hash(e.to_string()))?
            .map_err(|e| StoreError::Hash(e.to_string()))?;
        let record = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: hash,
            created_at: Utc::now(),
        };

        let _persist = self.persist.lock().await;
        let snapshot = {
            let mut map = self.users.write();
            // re-check: another insert may have won while hashing
            if map.contains_key(&record.email) {
                return Err(StoreError::DuplicateEmail(record.email));
            }
            map.insert(record.email.clone(), record.clone());
            map.values().cloned().collect::<Vec<_>>()
        };
        let path = self.path.clone();
        let written = tokio::task::spawn_blocking(move || write_users(&path, snapshot))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))
            .and_then(|r| r);
        if let Err(e) = written {
            self.users.write().remove(&record.email);
            return Err(e);
        }
        debug!(email = %record.email, id = %record.id, "user inserted");
        Ok(record)
    }
}
