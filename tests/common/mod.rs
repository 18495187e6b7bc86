//! Shared fixtures: a temp database + public folder with one registered user.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use authgate::config::ServerConfig;
use authgate::server::{AppState, build_router};
use authgate::storage::{CredentialStore, FileUserStore, NewUser, StoreError, StoreResult, User};

pub const EMAIL: &str = "alice@example.com";
pub const PASSWORD: &str = "secret123";
pub const MEMBERS_MARKER: &str = "members only: hello";

pub struct TestApp {
    pub tmp: TempDir,
    pub state: AppState,
    pub router: axum::Router,
}

pub fn test_config(tmp: &TempDir) -> ServerConfig {
    ServerConfig {
        port: 0,
        db_root: tmp.path().join("db"),
        public_dir: tmp.path().join("public"),
        session_secret: Some("0123456789abcdef0123456789abcdef-test".to_string()),
        session_ttl: Duration::from_secs(300),
        secure_cookies: false,
        sweep_interval: Duration::from_secs(60),
    }
}

fn write_public(tmp: &TempDir) -> Result<()> {
    let public = tmp.path().join("public");
    std::fs::create_dir_all(&public)?;
    std::fs::write(public.join("index.html"), "<html><body>public entry</body></html>")?;
    std::fs::write(public.join("members.html"), format!("<html><body>{}</body></html>", MEMBERS_MARKER))?;
    Ok(())
}

/// Router over a file store holding alice@example.com / secret123.
pub async fn test_app() -> Result<TestApp> {
    test_app_with(|_| {}).await
}

/// Like `test_app`, with `tweak` applied to the config first.
pub async fn test_app_with(tweak: impl FnOnce(&mut ServerConfig)) -> Result<TestApp> {
    let tmp = tempfile::tempdir()?;
    write_public(&tmp)?;
    let mut config = test_config(&tmp);
    tweak(&mut config);
    let store = FileUserStore::open(&config.db_root)?;
    store.insert(NewUser { email: EMAIL.into(), password: PASSWORD.into() }).await?;
    let state = AppState::from_config(&config, Arc::new(store))?;
    let router = build_router(state.clone());
    Ok(TestApp { tmp, state, router })
}

/// Credential store whose every call fails, as if the database were unreachable.
pub struct UnavailableStore;

#[async_trait]
impl CredentialStore for UnavailableStore {
    async fn find_by_email(&self, _email: &str) -> StoreResult<Option<User>> {
        Err(StoreError::Io(std::io::Error::other("connection refused")))
    }

    async fn insert(&self, _user: NewUser) -> StoreResult<User> {
        Err(StoreError::Io(std::io::Error::other("connection refused")))
    }
}

pub fn unavailable_app() -> Result<TestApp> {
    let tmp = tempfile::tempdir()?;
    write_public(&tmp)?;
    let config = test_config(&tmp);
    let state = AppState::from_config(&config, Arc::new(UnavailableStore))?;
    let router = build_router(state.clone());
    Ok(TestApp { tmp, state, router })
}

/// `name=value` part of a `Set-Cookie` header value.
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap_or_default().trim().to_string()
}
