use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use crate::storage::User;
use super::service::AuthService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Authenticated,
    Anonymous,
}

/// Per-request auth state. `identity` is set only when the request carried a valid
/// cookie for a live session.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub identity: Option<User>,
    pub session_id: Option<String>,
}

impl RequestContext {
    pub fn anonymous() -> Self { Self::default() }

    pub fn authenticated(user: User, session_id: String) -> Self {
        Self { identity: Some(user), session_id: Some(session_id) }
    }

    pub fn state(&self) -> GateState {
        if self.identity.is_some() { GateState::Authenticated } else { GateState::Anonymous }
    }
}

/// Requests that never passed through `attach_session` read as anonymous.
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<RequestContext>().cloned().unwrap_or_default())
    }
}

/// Middleware resolving the session cookie into a `RequestContext` extension.
pub async fn attach_session(State(auth): State<Arc<AuthService>>, mut req: Request, next: Next) -> Response {
    let ctx = auth.resolve(req.headers());
    req.extensions_mut().insert(ctx);
    next.run(req).await
}
