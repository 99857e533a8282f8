//! Session token storage
//!
//! A [`TokenStore`] binds opaque session tokens to a user and an expiration.
//! Backends only implement the primitive operations; token generation with
//! collision retry lives in the provided [`TokenStore::create`] so every
//! backend gets the same insert-if-absent semantics.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::models::Session;
use crate::session::error::SessionError;
use crate::utils::crypto::{generate_token, hash_token};

/// Attempts at generating a non-colliding token before giving up
pub const MAX_CREATE_ATTEMPTS: usize = 5;

/// What a store keeps for one token. The raw token itself is never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenBinding {
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub grace_until: Option<DateTime<Utc>>,
}

impl TokenBinding {
    fn into_session(self, token: &str) -> Session {
        Session {
            user_id: self.user_id,
            token: token.to_string(),
            expires_at: self.expires_at,
            grace_until: self.grace_until,
        }
    }
}

pub trait TokenStore: Send + Sync {
    /// Insert `binding` under `verifier` unless the key is already taken
    ///
    /// Returns `Ok(false)` on collision. Implementations must perform the check
    /// and the insert atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the backing store cannot be written
    fn insert_if_absent(&self, verifier: &str, binding: TokenBinding) -> Result<bool, SessionError>;

    /// Fetch the binding stored under `verifier`
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the backing store cannot be read
    fn get(&self, verifier: &str) -> Result<Option<TokenBinding>, SessionError>;

    /// Remove the binding stored under `verifier`, returning whether one existed
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the backing store cannot be written
    fn remove(&self, verifier: &str) -> Result<bool, SessionError>;

    /// Remove every binding for `user_id`, returning how many were removed
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the backing store cannot be written
    fn revoke_all(&self, user_id: &str) -> Result<usize, SessionError>;

    /// All bindings currently held for `user_id`
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the backing store cannot be read
    fn sessions_for(&self, user_id: &str) -> Result<Vec<TokenBinding>, SessionError>;

    /// Drop bindings whose expiration (including grace) is before `now`
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the backing store cannot be written
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, SessionError>;

    /// Source of fresh tokens
    fn generate_token(&self) -> String {
        generate_token()
    }

    /// Create a new token bound to `user_id` until `expires_at`
    ///
    /// Generation is retried on collision; an existing binding is never
    /// overwritten.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store cannot be written or no free
    /// token was found within `MAX_CREATE_ATTEMPTS`
    fn create(
        &self,
        user_id: &str,
        expires_at: DateTime<Utc>,
        grace_until: Option<DateTime<Utc>>,
    ) -> Result<String, SessionError> {
        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            let token = self.generate_token();
            let binding = TokenBinding {
                user_id: user_id.to_string(),
                expires_at,
                grace_until,
            };

            if self.insert_if_absent(&hash_token(&token), binding)? {
                debug!("Bound new session token for user '{user_id}' (attempt {attempt})");
                return Ok(token);
            }

            warn!("Session token collision on attempt {attempt}, regenerating");
        }

        Err(SessionError::StorageUnavailable(format!(
            "no unique token after {MAX_CREATE_ATTEMPTS} attempts"
        )))
    }

    /// Look up the session a token belongs to
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if the token is unknown, or `StorageUnavailable`
    fn lookup(&self, token: &str) -> Result<Session, SessionError> {
        self.get(&hash_token(token))?
            .map(|binding| binding.into_session(token))
            .ok_or(SessionError::SessionNotFound)
    }

    /// Revoke a token. Revoking an unknown token is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the backing store cannot be written
    fn revoke(&self, token: &str) -> Result<(), SessionError> {
        if self.remove(&hash_token(token))? {
            debug!("Revoked session token");
        }
        Ok(())
    }
}

/// Process-wide in-memory token table
#[derive(Default)]
pub struct InMemoryTokenStore {
    bindings: RwLock<HashMap<String, TokenBinding>>,
}

impl InMemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live bindings
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the table lock is poisoned
    pub fn len(&self) -> Result<usize, SessionError> {
        Ok(self.read()?.len())
    }

    /// Whether the table holds no bindings
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the table lock is poisoned
    pub fn is_empty(&self) -> Result<bool, SessionError> {
        Ok(self.read()?.is_empty())
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, TokenBinding>>, SessionError> {
        self.bindings
            .read()
            .map_err(|_| SessionError::StorageUnavailable("token table lock poisoned".to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, TokenBinding>>, SessionError> {
        self.bindings
            .write()
            .map_err(|_| SessionError::StorageUnavailable("token table lock poisoned".to_string()))
    }
}

impl TokenStore for InMemoryTokenStore {
    fn insert_if_absent(&self, verifier: &str, binding: TokenBinding) -> Result<bool, SessionError> {
        match self.write()?.entry(verifier.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(binding);
                Ok(true)
            }
        }
    }

    fn get(&self, verifier: &str) -> Result<Option<TokenBinding>, SessionError> {
        Ok(self.read()?.get(verifier).cloned())
    }

    fn remove(&self, verifier: &str) -> Result<bool, SessionError> {
        Ok(self.write()?.remove(verifier).is_some())
    }

    fn revoke_all(&self, user_id: &str) -> Result<usize, SessionError> {
        let mut bindings = self.write()?;
        let before = bindings.len();
        bindings.retain(|_, binding| binding.user_id != user_id);
        Ok(before - bindings.len())
    }

    fn sessions_for(&self, user_id: &str) -> Result<Vec<TokenBinding>, SessionError> {
        Ok(self
            .read()?
            .values()
            .filter(|binding| binding.user_id == user_id)
            .cloned()
            .collect())
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, SessionError> {
        let mut bindings = self.write()?;
        let before = bindings.len();
        bindings.retain(|_, binding| binding.grace_until.unwrap_or(binding.expires_at) >= now);
        Ok(before - bindings.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::{Arc, Mutex};

    /// Store that hands out scripted tokens to force collisions
    struct ScriptedStore {
        inner: InMemoryTokenStore,
        tokens: Mutex<Vec<String>>,
    }

    impl ScriptedStore {
        fn new(tokens: &[&str]) -> Self {
            Self {
                inner: InMemoryTokenStore::new(),
                tokens: Mutex::new(tokens.iter().rev().map(ToString::to_string).collect()),
            }
        }
    }

    impl TokenStore for ScriptedStore {
        fn insert_if_absent(&self, verifier: &str, binding: TokenBinding) -> Result<bool, SessionError> {
            self.inner.insert_if_absent(verifier, binding)
        }
        fn get(&self, verifier: &str) -> Result<Option<TokenBinding>, SessionError> {
            self.inner.get(verifier)
        }
        fn remove(&self, verifier: &str) -> Result<bool, SessionError> {
            self.inner.remove(verifier)
        }
        fn revoke_all(&self, user_id: &str) -> Result<usize, SessionError> {
            self.inner.revoke_all(user_id)
        }
        fn sessions_for(&self, user_id: &str) -> Result<Vec<TokenBinding>, SessionError> {
            self.inner.sessions_for(user_id)
        }
        fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, SessionError> {
            self.inner.purge_expired(now)
        }
        fn generate_token(&self) -> String {
            self.tokens.lock().unwrap().pop().unwrap_or_else(|| "fallback".to_string())
        }
    }

    #[test]
    fn test_create_and_lookup() {
        let store = InMemoryTokenStore::new();
        let expires_at = Utc::now() + Duration::days(2);

        let token = store.create("u1", expires_at, None).unwrap();
        let session = store.lookup(&token).unwrap();

        assert_eq!(session.user_id, "u1");
        assert_eq!(session.token, token);
        assert_eq!(session.expires_at, expires_at);
        assert!(session.grace_until.is_none());
    }

    #[test]
    fn test_raw_token_is_not_a_key() {
        let store = InMemoryTokenStore::new();
        let token = store.create("u1", Utc::now(), None).unwrap();

        assert!(store.get(&token).unwrap().is_none());
        assert!(store.get(&hash_token(&token)).unwrap().is_some());
    }

    #[test]
    fn test_lookup_unknown_token() {
        let store = InMemoryTokenStore::new();
        assert!(matches!(
            store.lookup("missing"),
            Err(SessionError::SessionNotFound)
        ));
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let store = InMemoryTokenStore::new();
        let token = store.create("u1", Utc::now(), None).unwrap();

        store.revoke(&token).unwrap();
        store.revoke(&token).unwrap();
        store.revoke("never-issued").unwrap();

        assert!(matches!(
            store.lookup(&token),
            Err(SessionError::SessionNotFound)
        ));
    }

    #[test]
    fn test_collision_retries_without_overwrite() {
        let store = ScriptedStore::new(&["dup", "dup", "fresh"]);
        let expires_at = Utc::now();

        let first = store.create("u1", expires_at, None).unwrap();
        let second = store.create("u2", expires_at, None).unwrap();

        assert_eq!(first, "dup");
        assert_eq!(second, "fresh");
        assert_eq!(store.lookup("dup").unwrap().user_id, "u1");
        assert_eq!(store.lookup("fresh").unwrap().user_id, "u2");
    }

    #[test]
    fn test_collision_exhaustion_is_storage_error() {
        let tokens = vec!["same"; MAX_CREATE_ATTEMPTS + 1];
        let store = ScriptedStore::new(&tokens);

        store.create("u1", Utc::now(), None).unwrap();
        assert!(matches!(
            store.create("u2", Utc::now(), None),
            Err(SessionError::StorageUnavailable(_))
        ));
    }

    #[test]
    fn test_revoke_all_and_sessions_for() {
        let store = InMemoryTokenStore::new();
        let expires_at = Utc::now();
        store.create("u1", expires_at, None).unwrap();
        store.create("u1", expires_at, None).unwrap();
        store.create("u2", expires_at, None).unwrap();

        assert_eq!(store.sessions_for("u1").unwrap().len(), 2);
        assert_eq!(store.revoke_all("u1").unwrap(), 2);
        assert!(store.sessions_for("u1").unwrap().is_empty());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_purge_expired_respects_grace() {
        let store = InMemoryTokenStore::new();
        let now = Utc::now();
        store.create("gone", now - Duration::hours(1), None).unwrap();
        store
            .create("grace", now - Duration::hours(1), Some(now + Duration::hours(11)))
            .unwrap();
        store.create("live", now + Duration::days(1), None).unwrap();

        assert_eq!(store.purge_expired(now).unwrap(), 1);
        assert!(store.sessions_for("gone").unwrap().is_empty());
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_concurrent_create_yields_unique_tokens() {
        let store = Arc::new(InMemoryTokenStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..25)
                        .map(|_| store.create(&format!("user{i}"), Utc::now(), None).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut tokens: Vec<String> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        tokens.sort();
        tokens.dedup();

        assert_eq!(tokens.len(), 200);
        assert_eq!(store.len().unwrap(), 200);
    }
}
