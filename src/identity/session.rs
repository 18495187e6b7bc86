use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::security;
use crate::storage::User;

/// Opaque session-side representation of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPayload(pub String);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to encode session payload: {0}")]
    Encode(serde_json::Error),

    #[error("failed to decode session payload: {0}")]
    Decode(serde_json::Error),

    #[error("failed to generate session id: {0}")]
    Token(String),

    #[error("session ttl of {0:?} is past the end of the clock")]
    Expiry(Duration),
}

/// Converts a user to and from its stored session form.
/// `deserialize(serialize(u))` must yield `u`.
pub trait SessionSerializer: Send + Sync {
    fn serialize(&self, user: &User) -> Result<SessionPayload, SessionError>;
    fn deserialize(&self, payload: &SessionPayload) -> Result<User, SessionError>;
}

/// Stores the whole user record as JSON. The payload stays server-side.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerbatimSerializer;

impl SessionSerializer for VerbatimSerializer {
    fn serialize(&self, user: &User) -> Result<SessionPayload, SessionError> {
        serde_json::to_string(user).map(SessionPayload).map_err(SessionError::Encode)
    }

    fn deserialize(&self, payload: &SessionPayload) -> Result<User, SessionError> {
        serde_json::from_str(&payload.0).map_err(SessionError::Decode)
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub payload: SessionPayload,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

/// In-memory server-side session store keyed by session id.
///
/// Cheap to clone; clones share the same map.
#[derive(Clone)]
pub struct SessionManager {
    ttl: Duration,
    serializer: Arc<dyn SessionSerializer>,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60 * 24)) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self::with_serializer(ttl, Arc::new(VerbatimSerializer))
    }

    pub fn with_serializer(ttl: Duration, serializer: Arc<dyn SessionSerializer>) -> Self {
        Self { ttl, serializer, sessions: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn ttl(&self) -> Duration { self.ttl }

    pub fn issue(&self, user: &User) -> Result<Session, SessionError> {
        let payload = self.serializer.serialize(user)?;
        let sid = security::random_token(32).map_err(|e| SessionError::Token(e.to_string()))?;
        let now = Instant::now();
        let expires_at = now.checked_add(self.ttl).ok_or(SessionError::Expiry(self.ttl))?;
        let sess = Session {
            session_id: sid.clone(),
            payload,
            issued_at: now,
            expires_at,
        };
        self.sessions.write().insert(sid.clone(), sess.clone());
        debug!(email = %user.email, ttl_secs = self.ttl.as_secs(), "session issued");
        Ok(sess)
    }

    /// Identity for a live session. Expired or undecodable sessions are dropped.
    pub fn validate(&self, sid: &str) -> Option<User> {
        let now = Instant::now();
        let payload = {
            let map = self.sessions.read();
            let sess = map.get(sid)?;
            if sess.expires_at > now { Some(sess.payload.clone()) } else { None }
        };
        let Some(payload) = payload else {
            self.sessions.write().remove(sid);
            debug!("expired session dropped");
            return None;
        };
        match self.serializer.deserialize(&payload) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "dropping session with unreadable payload");
                self.sessions.write().remove(sid);
                None
            }
        }
    }

    pub fn destroy(&self, sid: &str) -> bool {
        self.sessions.write().remove(sid).is_some()
    }

    /// Remove every expired session; returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut map = self.sessions.write();
        let before = map.len();
        map.retain(|_, s| s.expires_at > now);
        before - map.len()
    }

    pub fn len(&self) -> usize { self.sessions.read().len() }

    pub fn is_empty(&self) -> bool { self.sessions.read().is_empty() }
}
