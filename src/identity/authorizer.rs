use std::future::Future;

use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::request_context::{GateState, RequestContext};

/// Where anonymous requests to gated routes are sent.
pub const PUBLIC_ROOT: &str = "/";

/// Gate denial: a `302 Found` to a public location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect {
    pub location: &'static str,
}

impl Redirect {
    pub fn to_public_root() -> Self { Self { location: PUBLIC_ROOT } }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        (StatusCode::FOUND, [(header::LOCATION, self.location)]).into_response()
    }
}

/// Run `next` only for an authenticated context.
pub async fn guard<F, Fut, T>(ctx: &RequestContext, next: F) -> Result<T, Redirect>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    match ctx.state() {
        GateState::Authenticated => Ok(next().await),
        GateState::Anonymous => Err(Redirect::to_public_root()),
    }
}

/// Route middleware wrapping `guard`; use with `axum::middleware::from_fn`.
pub async fn require_login(ctx: RequestContext, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    match guard(&ctx, || next.run(req)).await {
        Ok(resp) => resp,
        Err(redirect) => {
            debug!(path = %path, location = redirect.location, "anonymous request redirected");
            redirect.into_response()
        }
    }
}
