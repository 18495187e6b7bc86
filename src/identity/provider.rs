use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::storage::{CredentialStore, StoreError, User};
use super::session::SessionError;

/// Why a credential check was rejected.
///
/// The two reasons are reported separately to the login caller, which lets a caller
/// tell registered emails apart from unknown ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    NoSuchUser,
    IncorrectPassword,
}

impl FailureReason {
    pub fn reason(&self) -> &'static str {
        match self {
            FailureReason::NoSuchUser => "no such user",
            FailureReason::IncorrectPassword => "incorrect password",
        }
    }

    /// User-facing text returned by the login endpoint.
    pub fn message(&self) -> &'static str {
        match self {
            FailureReason::NoSuchUser => "Incorrect email.",
            FailureReason::IncorrectPassword => "Incorrect password.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Success(User),
    Failure(FailureReason),
}

/// Internal failures. These are server errors, not rejected credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("credential store failure: {0}")]
    Store(#[from] StoreError),

    #[error("password verification task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("session failure: {0}")]
    Session(#[from] SessionError),
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> Result<AuthOutcome, AuthError>;
}

/// Email + password strategy over a credential store.
#[derive(Clone)]
pub struct LocalStrategy {
    store: Arc<dyn CredentialStore>,
}

impl LocalStrategy {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self { Self { store } }
}

#[async_trait]
impl AuthProvider for LocalStrategy {
    async fn authenticate(&self, email: &str, password: &str) -> Result<AuthOutcome, AuthError> {
        let Some(user) = self.store.find_by_email(email).await? else {
            debug!(email, reason = FailureReason::NoSuchUser.reason(), "authentication rejected");
            return Ok(AuthOutcome::Failure(FailureReason::NoSuchUser));
        };
        // argon2 is CPU bound; keep it off the async workers
        let candidate = password.to_string();
        let (user, valid) = tokio::task::spawn_blocking(move || {
            let valid = user.valid_password(&candidate);
            (user, valid)
        })
        .await?;
        if !valid {
            debug!(email, reason = FailureReason::IncorrectPassword.reason(), "authentication rejected");
            return Ok(AuthOutcome::Failure(FailureReason::IncorrectPassword));
        }
        Ok(AuthOutcome::Success(user))
    }
}
