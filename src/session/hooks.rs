//! Extension points around issuance
//!
//! Every method has a pass-through default, so implementors only override what
//! they need. [`SessionHooks::should_emit`] is the veto: it runs once, right
//! before directives are assembled, after the token already exists.

use chrono::{DateTime, Duration, Utc};

use crate::session::cookie::{CookieScheme, Expiry};

/// What the veto sees. Clearing passes an empty user and no scheme or token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitContext<'a> {
    pub user_id: &'a str,
    pub expire: Expiry,
    pub expiration: Option<DateTime<Utc>>,
    pub scheme: Option<CookieScheme>,
    pub token: Option<&'a str>,
}

impl EmitContext<'_> {
    /// Context used when clearing cookies
    #[must_use]
    pub fn clearing() -> EmitContext<'static> {
        EmitContext {
            user_id: "",
            expire: Expiry::Session,
            expiration: None,
            scheme: None,
            token: None,
        }
    }

    #[must_use]
    pub fn is_clearing(&self) -> bool {
        self.scheme.is_none()
    }
}

/// A freshly encoded cookie, reported before the veto runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieEvent<'a> {
    pub value: &'a str,
    pub expire: Expiry,
    pub expiration: DateTime<Utc>,
    pub user_id: &'a str,
    pub scheme: CookieScheme,
    pub token: &'a str,
}

pub trait SessionHooks: Send + Sync {
    /// Session length for a user; `default` comes from the configured lifetimes
    fn auth_cookie_expiration(&self, _user_id: &str, _remember: bool, default: Duration) -> Duration {
        default
    }

    /// Override the authentication cookie's Secure flag
    fn secure_auth_cookie(&self, secure: bool, _user_id: &str) -> bool {
        secure
    }

    /// Override the logged-in cookie's Secure flag
    fn secure_logged_in_cookie(&self, secure_logged_in: bool, _user_id: &str, _secure: bool) -> bool {
        secure_logged_in
    }

    fn on_auth_cookie(&self, _event: &CookieEvent<'_>) {}

    fn on_logged_in_cookie(&self, _event: &CookieEvent<'_>) {}

    /// Whether cookies should be sent to the client at all
    fn should_emit(&self, _context: &EmitContext<'_>) -> bool {
        true
    }
}

/// Hooks that change nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl SessionHooks for DefaultHooks {}
