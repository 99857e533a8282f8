use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::session::cookie::Expiry;

/// One authenticated session
///
/// Sessions are never mutated in place. Renewal produces a new `Session` with
/// the same token and a recomputed expiration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Set only for remembered sessions; the browser keeps the cookie until then
    pub grace_until: Option<DateTime<Utc>>,
}

impl Session {
    /// Build a session, deriving the grace window from `grace` when remembered
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        token: impl Into<String>,
        expires_at: DateTime<Utc>,
        grace: Option<Duration>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
            expires_at,
            grace_until: grace.map(|grace| expires_at + grace),
        }
    }

    /// Whether the nominal expiration has passed
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Whether the session is still accepted, counting the grace window
    #[must_use]
    pub fn is_within_grace(&self, now: DateTime<Utc>) -> bool {
        now <= self.grace_until.unwrap_or(self.expires_at)
    }

    /// Expiry to put on the cookie: the grace deadline, or session-only
    #[must_use]
    pub fn cookie_expiry(&self) -> Expiry {
        self.grace_until.map_or(Expiry::Session, Expiry::At)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remembered_session_has_grace() {
        let now = Utc::now();
        let session = Session::new("u1", "tok", now + Duration::days(14), Some(Duration::hours(12)));

        assert_eq!(
            session.grace_until,
            Some(now + Duration::days(14) + Duration::hours(12))
        );
        assert_eq!(
            session.cookie_expiry(),
            Expiry::At(now + Duration::days(14) + Duration::hours(12))
        );
    }

    #[test]
    fn test_plain_session_is_session_only() {
        let now = Utc::now();
        let session = Session::new("u1", "tok", now + Duration::days(2), None);

        assert!(session.grace_until.is_none());
        assert_eq!(session.cookie_expiry(), Expiry::Session);
    }

    #[test]
    fn test_expiration_and_grace() {
        let now = Utc::now();
        let session = Session::new("u1", "tok", now, Some(Duration::hours(1)));

        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + Duration::minutes(30)));
        assert!(session.is_within_grace(now + Duration::minutes(30)));
        assert!(!session.is_within_grace(now + Duration::hours(2)));

        let plain = Session::new("u1", "tok", now, None);
        assert!(!plain.is_within_grace(now + Duration::seconds(1)));
    }
}
