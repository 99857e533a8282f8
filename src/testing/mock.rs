//! Mock hooks and stores

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::session::{
    CookieEvent, EmitContext, SessionError, SessionHooks, TokenBinding, TokenStore,
};

/// Hooks that record every call and optionally veto emission
#[derive(Default)]
pub struct RecordingHooks {
    pub veto: bool,
    pub events: Mutex<Vec<String>>,
}

impl RecordingHooks {
    #[must_use]
    pub fn vetoing() -> Self {
        Self {
            veto: true,
            ..Default::default()
        }
    }

    /// Recorded calls, in order
    ///
    /// # Panics
    ///
    /// Panics if the event lock is poisoned
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl SessionHooks for RecordingHooks {
    fn on_auth_cookie(&self, event: &CookieEvent<'_>) {
        self.record(format!("set_auth_cookie:{}", event.scheme));
    }

    fn on_logged_in_cookie(&self, event: &CookieEvent<'_>) {
        self.record(format!("set_logged_in_cookie:{}", event.scheme));
    }

    fn should_emit(&self, context: &EmitContext<'_>) -> bool {
        self.record(format!("send_auth_cookies:{}", context.user_id));
        !self.veto
    }
}

/// Store whose backend is always down
#[derive(Default)]
pub struct FailingTokenStore;

impl FailingTokenStore {
    fn unavailable() -> SessionError {
        SessionError::StorageUnavailable("backend offline".to_string())
    }
}

impl TokenStore for FailingTokenStore {
    fn insert_if_absent(&self, _verifier: &str, _binding: TokenBinding) -> Result<bool, SessionError> {
        Err(Self::unavailable())
    }

    fn get(&self, _verifier: &str) -> Result<Option<TokenBinding>, SessionError> {
        Err(Self::unavailable())
    }

    fn remove(&self, _verifier: &str) -> Result<bool, SessionError> {
        Err(Self::unavailable())
    }

    fn revoke_all(&self, _user_id: &str) -> Result<usize, SessionError> {
        Err(Self::unavailable())
    }

    fn sessions_for(&self, _user_id: &str) -> Result<Vec<TokenBinding>, SessionError> {
        Err(Self::unavailable())
    }

    fn purge_expired(&self, _now: DateTime<Utc>) -> Result<usize, SessionError> {
        Err(Self::unavailable())
    }
}
