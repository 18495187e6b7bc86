//! Unified application error model for the HTTP surface.
//! Library layers return typed errors (`AuthError`); handlers convert them into
//! `AppError`, which renders as a JSON body with a status code.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt::{Display, Formatter};

use crate::identity::AuthError;

#[derive(Debug, Clone)]
pub enum AppError {
    UserInput { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. } | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. } | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

/// Store and task failures behind a login are never reported as bad credentials.
impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::internal("auth_internal".to_string(), err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        // internal details stay in the logs
        let message = match &self {
            AppError::Internal { .. } => {
                tracing::error!(code = self.code_str(), "{}", self.message());
                "internal server error".to_string()
            }
            AppError::UserInput { .. } => self.message().to_string(),
        };
        (status, Json(serde_json::json!({
            "status": "error",
            "code": self.code_str(),
            "message": message,
        }))).into_response()
    }
}
