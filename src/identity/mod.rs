//! Login strategy, server-side sessions and the login gate.
//! Keep the public surface thin and split implementation across sub-modules.

mod provider;
mod session;
mod service;
mod request_context;
mod authorizer;

pub use provider::{AuthError, AuthOutcome, AuthProvider, FailureReason, LocalStrategy};
pub use session::{Session, SessionError, SessionManager, SessionPayload, SessionSerializer, VerbatimSerializer};
pub use service::{AuthService, CookieSettings, LoginResult, SESSION_COOKIE, parse_cookie};
pub use request_context::{GateState, RequestContext, attach_session};
pub use authorizer::{PUBLIC_ROOT, Redirect, guard, require_login};
