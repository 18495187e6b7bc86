use std::sync::Arc;

use axum::http::HeaderMap;
use tracing::{info, warn};

use crate::security::CookieKey;
use crate::storage::{CredentialStore, User};
use super::provider::{AuthError, AuthOutcome, AuthProvider, FailureReason, LocalStrategy};
use super::request_context::RequestContext;
use super::session::SessionManager;

pub const SESSION_COOKIE: &str = "authgate.sid";

#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self { Self { name: SESSION_COOKIE.to_string(), secure: false } }
}

#[derive(Debug, Clone)]
pub enum LoginResult {
    /// Session created; `set_cookie` is the full `Set-Cookie` header value.
    Established { user: User, set_cookie: String },
    Rejected(FailureReason),
}

/// Login, session lookup and logout, built once at startup and shared by the routes.
pub struct AuthService {
    provider: Arc<dyn AuthProvider>,
    sessions: SessionManager,
    key: CookieKey,
    cookie: CookieSettings,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, sessions: SessionManager, key: CookieKey, cookie: CookieSettings) -> Self {
        Self::with_provider(Arc::new(LocalStrategy::new(store)), sessions, key, cookie)
    }

    pub fn with_provider(provider: Arc<dyn AuthProvider>, sessions: SessionManager, key: CookieKey, cookie: CookieSettings) -> Self {
        Self { provider, sessions, key, cookie }
    }

    pub fn sessions(&self) -> &SessionManager { &self.sessions }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<AuthOutcome, AuthError> {
        self.provider.authenticate(email, password).await
    }

    /// Verify credentials and, on success, open a session. Any session the request
    /// already carried is replaced.
    pub async fn login(&self, email: &str, password: &str, headers: &HeaderMap) -> Result<LoginResult, AuthError> {
        match self.authenticate(email, password).await? {
            AuthOutcome::Success(user) => {
                if let Some(old) = self.session_id_from(headers) {
                    self.sessions.destroy(&old);
                }
                let session = self.sessions.issue(&user)?;
                info!(email = %user.email, "login succeeded");
                let set_cookie = self.session_cookie(&session.session_id);
                Ok(LoginResult::Established { user, set_cookie })
            }
            AuthOutcome::Failure(reason) => {
                info!(email, reason = reason.reason(), "login rejected");
                Ok(LoginResult::Rejected(reason))
            }
        }
    }

    /// Build the request context from the session cookie, if any.
    pub fn resolve(&self, headers: &HeaderMap) -> RequestContext {
        let Some(sid) = self.session_id_from(headers) else { return RequestContext::anonymous(); };
        match self.sessions.validate(&sid) {
            Some(user) => RequestContext::authenticated(user, sid),
            None => RequestContext::anonymous(),
        }
    }

    /// Destroy the session `ctx` was resolved from. Returns whether one existed.
    pub fn logout(&self, ctx: &RequestContext) -> bool {
        match &ctx.session_id {
            Some(sid) => self.sessions.destroy(sid),
            None => false,
        }
    }

    fn session_id_from(&self, headers: &HeaderMap) -> Option<String> {
        let raw = parse_cookie(headers, &self.cookie.name)?;
        let sid = self.key.unsign(&raw);
        if sid.is_none() {
            warn!("session cookie with bad signature ignored");
        }
        sid
    }

    pub fn session_cookie(&self, sid: &str) -> String {
        format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
            self.cookie.name,
            self.key.sign(sid),
            self.sessions.ttl().as_secs(),
            if self.cookie.secure { "; Secure" } else { "" }
        )
    }

    pub fn clear_cookie(&self) -> String {
        format!(
            "{}=; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; HttpOnly; SameSite=Lax; Path=/{}",
            self.cookie.name,
            if self.cookie.secure { "; Secure" } else { "" }
        )
    }
}

/// Value of cookie `name` across every `Cookie` header.
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(axum::http::header::COOKIE) {
        let Ok(s) = cookie.to_str() else { continue; };
        for part in s.split(';') {
            let p = part.trim();
            if let Some((k, v)) = p.split_once('=') {
                if k == name { return Some(v.to_string()); }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileUserStore, NewUser};
    use axum::http::HeaderValue;
    use std::time::Duration;
    use tempfile::tempdir;

    async fn service() -> anyhow::Result<(tempfile::TempDir, AuthService)> {
        let tmp = tempdir()?;
        let store = FileUserStore::open(tmp.path())?;
        store.insert(NewUser { email: "alice@example.com".into(), password: "secret123".into() }).await?;
        let svc = AuthService::new(Arc::new(store), SessionManager::default(), CookieKey::new([9u8; 32])?, CookieSettings::default());
        Ok((tmp, svc))
    }

    fn cookie_headers(set_cookie: &str) -> HeaderMap {
        let pair = set_cookie.split(';').next().unwrap();
        let mut h = HeaderMap::new();
        h.insert("cookie", HeaderValue::from_str(pair).unwrap());
        h
    }

    #[test]
    fn parse_cookie_finds_named_value() {
        let mut h = HeaderMap::new();
        h.insert("cookie", HeaderValue::from_static("a=1; authgate.sid=xyz.sig; b=2"));
        assert_eq!(parse_cookie(&h, "authgate.sid").as_deref(), Some("xyz.sig"));
        assert_eq!(parse_cookie(&h, "b").as_deref(), Some("2"));
        assert_eq!(parse_cookie(&h, "missing"), None);
        assert_eq!(parse_cookie(&HeaderMap::new(), "a"), None);
    }

    #[tokio::test]
    async fn login_then_resolve_then_logout() -> anyhow::Result<()> {
        let (_tmp, svc) = service().await?;
        let LoginResult::Established { user, set_cookie } = svc.login("alice@example.com", "secret123", &HeaderMap::new()).await? else {
            panic!("expected login to succeed");
        };
        assert!(set_cookie.starts_with("authgate.sid="));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(!set_cookie.contains("Secure"));

        let headers = cookie_headers(&set_cookie);
        let ctx = svc.resolve(&headers);
        assert_eq!(ctx.identity.as_ref(), Some(&user));

        assert!(svc.logout(&ctx));
        assert!(svc.resolve(&headers).identity.is_none());
        assert!(!svc.logout(&ctx));
        assert!(!svc.logout(&RequestContext::anonymous()));
        Ok(())
    }

    #[tokio::test]
    async fn rejected_login_opens_no_session() -> anyhow::Result<()> {
        let (_tmp, svc) = service().await?;
        let res = svc.login("alice@example.com", "wrongpass", &HeaderMap::new()).await?;
        assert!(matches!(res, LoginResult::Rejected(FailureReason::IncorrectPassword)));
        let res = svc.login("nobody@example.com", "secret123", &HeaderMap::new()).await?;
        assert!(matches!(res, LoginResult::Rejected(FailureReason::NoSuchUser)));
        assert!(svc.sessions().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn relogin_replaces_previous_session() -> anyhow::Result<()> {
        let (_tmp, svc) = service().await?;
        let LoginResult::Established { set_cookie: first, .. } = svc.login("alice@example.com", "secret123", &HeaderMap::new()).await? else {
            panic!("login");
        };
        let first_headers = cookie_headers(&first);
        let LoginResult::Established { set_cookie: second, .. } = svc.login("alice@example.com", "secret123", &first_headers).await? else {
            panic!("login");
        };
        assert_eq!(svc.sessions().len(), 1);
        assert!(svc.resolve(&first_headers).identity.is_none());
        assert!(svc.resolve(&cookie_headers(&second)).identity.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn forged_or_unsigned_cookie_is_anonymous() -> anyhow::Result<()> {
        let (_tmp, svc) = service().await?;
        let LoginResult::Established { set_cookie, .. } = svc.login("alice@example.com", "secret123", &HeaderMap::new()).await? else {
            panic!("login");
        };
        let pair = set_cookie.split(';').next().unwrap();
        let signed = pair.trim_start_matches("authgate.sid=");
        let (sid, _sig) = signed.rsplit_once('.').unwrap();

        let mut h = HeaderMap::new();
        h.insert("cookie", HeaderValue::from_str(&format!("authgate.sid={}", sid))?);
        assert!(svc.resolve(&h).identity.is_none());

        let other_key = CookieKey::new([1u8; 32])?;
        let mut h = HeaderMap::new();
        h.insert("cookie", HeaderValue::from_str(&format!("authgate.sid={}", other_key.sign(sid)))?);
        assert!(svc.resolve(&h).identity.is_none());
        Ok(())
    }

    #[test]
    fn secure_flag_follows_settings() -> anyhow::Result<()> {
        let tmp = tempdir()?;
        let store = FileUserStore::open(tmp.path())?;
        let svc = AuthService::new(
            Arc::new(store),
            SessionManager::new(Duration::from_secs(120)),
            CookieKey::new([3u8; 32])?,
            CookieSettings { secure: true, ..Default::default() },
        );
        let c = svc.session_cookie("abc");
        assert!(c.ends_with("; Secure"));
        assert!(c.contains("Max-Age=120"));
        assert!(svc.clear_cookie().contains("Max-Age=0"));
        Ok(())
    }
}
