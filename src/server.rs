//!
//! authgate HTTP server
//! --------------------
//! Axum router wiring for the authenticated web app.
//!
//! Responsibilities:
//! - Session resolution on every request (cookie -> `RequestContext`).
//! - Login/logout endpoints backed by the `identity` module.
//! - Gated HTML routes that redirect anonymous visitors to `/`.
//! - Static assets from the public folder.
//! - Background eviction of expired sessions.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use axum::extract::{FromRequest, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router, middleware};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::identity::{self, AuthService, CookieSettings, LoginResult, Redirect, RequestContext, SessionManager};
use crate::security::CookieKey;
use crate::storage::{CredentialStore, FileUserStore};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub public_dir: PathBuf,
}

impl AppState {
    /// Build the auth service from configuration. Falls back to a per-process random
    /// signing key when no session secret is configured.
    pub fn from_config(config: &ServerConfig, store: Arc<dyn CredentialStore>) -> anyhow::Result<Self> {
        let key = match &config.session_secret {
            Some(secret) => CookieKey::new(secret.as_bytes()).context("invalid session secret")?,
            None => {
                warn!("no session secret configured; generated a random one, sessions will not survive a restart");
                CookieKey::generate()?
            }
        };
        let cookie = CookieSettings { secure: config.secure_cookies, ..Default::default() };
        let auth = AuthService::new(store, SessionManager::new(config.session_ttl), key, cookie);
        Ok(Self { auth: Arc::new(auth), public_dir: config.public_dir.clone() })
    }
}

/// Routes:
/// - `POST /api/login`: form or JSON credentials
/// - `GET /logout`
/// - `GET /api/user_data`
/// - `GET /members` (gated)
/// - everything else: static files
pub fn build_router(state: AppState) -> Router {
    let gated: Router<AppState> = Router::new()
        .route_service("/members", ServeFile::new(state.public_dir.join("members.html")))
        .route_layer(middleware::from_fn(identity::require_login));

    Router::new()
        .route("/api/login", post(login))
        .route("/logout", get(logout))
        .route("/api/user_data", get(user_data))
        .merge(gated)
        .fallback_service(ServeDir::new(&state.public_dir))
        .layer(middleware::from_fn_with_state(state.auth.clone(), identity::attach_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` on an already bound listener until ctrl-c.
pub async fn serve(listener: TcpListener, app: Router) -> anyhow::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// Periodically evict expired sessions.
pub fn spawn_session_sweeper(sessions: SessionManager, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = sessions.sweep_expired();
            if removed > 0 { tracing::debug!(removed = removed, "session_sweep"); }
        }
    })
}

fn log_startup(config: &ServerConfig) {
    let cwd = std::env::current_dir().ok();
    info!(
        target: "startup",
        "authgate starting: port={}, db_root={:?}, public_dir={:?}, session_ttl_secs={}, secure_cookies={}, cwd={:?}",
        config.port, config.db_root, config.public_dir, config.session_ttl.as_secs(), config.secure_cookies, cwd
    );
    if !config.public_dir.exists() {
        warn!(public_dir = ?config.public_dir, "public folder does not exist; static routes will 404");
    }
}

/// Open the credential store, build the router and listen on `config.port`.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    log_startup(&config);

    let store = FileUserStore::open(&config.db_root)
        .with_context(|| format!("While opening credential store under {:?}", config.db_root))?;
    let state = AppState::from_config(&config, Arc::new(store))?;
    spawn_session_sweeper(state.auth.sessions().clone(), config.sweep_interval);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await.with_context(|| format!("While binding {}", addr))?;
    info!("==> Listening on port {}. Visit http://localhost:{}/ in your browser.", config.port, config.port);
    serve(listener, build_router(state)).await
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

/// Login body, accepted as JSON or as an urlencoded form.
pub struct LoginBody(pub LoginPayload);

impl<S> FromRequest<S> for LoginBody
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.trim_start().starts_with("application/json"))
            .unwrap_or(false);
        if is_json {
            let Json(payload) = Json::<LoginPayload>::from_request(req, state)
                .await
                .map_err(|e| AppError::user("invalid_body".to_string(), e.body_text()))?;
            Ok(Self(payload))
        } else {
            let Form(payload) = Form::<LoginPayload>::from_request(req, state)
                .await
                .map_err(|e| AppError::user("invalid_body".to_string(), e.body_text()))?;
            Ok(Self(payload))
        }
    }
}

async fn login(State(state): State<AppState>, headers: HeaderMap, LoginBody(payload): LoginBody) -> Result<Response, AppError> {
    match state.auth.login(&payload.email, &payload.password, &headers).await? {
        LoginResult::Established { user, set_cookie } => Ok((
            StatusCode::OK,
            [(header::SET_COOKIE, set_cookie)],
            Json(json!({"email": user.email, "id": user.id})),
        )
            .into_response()),
        LoginResult::Rejected(reason) => Ok((
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": reason.message()})),
        )
            .into_response()),
    }
}

async fn logout(State(state): State<AppState>, ctx: RequestContext) -> Response {
    if state.auth.logout(&ctx) {
        info!("logout");
    }
    ([(header::SET_COOKIE, state.auth.clear_cookie())], Redirect::to_public_root()).into_response()
}

/// Current user's public fields, or `{}` for anonymous requests.
async fn user_data(ctx: RequestContext) -> Json<serde_json::Value> {
    match ctx.identity {
        Some(user) => Json(json!({"email": user.email, "id": user.id})),
        None => Json(json!({})),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::User;
    use chrono::Utc;
    use uuid::Uuid;

    fn alice() -> User {
        User { id: Uuid::new_v4(), email: "alice@example.com".into(), password_hash: String::new(), created_at: Utc::now() }
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_expired_sessions() -> anyhow::Result<()> {
        let sessions = SessionManager::new(Duration::ZERO);
        sessions.issue(&alice())?;
        sessions.issue(&alice())?;
        assert_eq!(sessions.len(), 2);
        let interval = Duration::from_secs(60);
        let sweeper = spawn_session_sweeper(sessions.clone(), interval);

        tokio::time::sleep(interval + Duration::from_secs(1)).await;
        assert!(sessions.is_empty());
        sweeper.abort();
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_keeps_live_sessions() -> anyhow::Result<()> {
        let sessions = SessionManager::default();
        sessions.issue(&alice())?;
        let sweeper = spawn_session_sweeper(sessions.clone(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sessions.len(), 1);
        sweeper.abort();
        Ok(())
    }
}
