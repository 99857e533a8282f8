//! Session Issuer - minting, renewing, validating and clearing session cookies
//!
//! Issuance is a linear pipeline:
//!
//! 1. **Requested** - validate the user id and compute expiration and attributes
//! 2. **TokenBound** - create a store binding, or reuse the caller's token (renewal)
//! 3. **Encoded** - sign the authentication and logged-in cookie values
//! 4. **Emitted** - consult the veto, then assemble the ordered directives
//!
//! A failure at any stage aborts the whole issuance; no partial directive list
//! is ever returned. A veto returns an empty list but keeps the store binding.

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Session;
use crate::session::codec::CookieCodec;
use crate::session::cookie::{CookieDirective, CookieNames, CookieScheme, Expiry};
use crate::session::error::SessionError;
use crate::session::hooks::{CookieEvent, DefaultHooks, EmitContext, SessionHooks};
use crate::session::policy::{ensure_compatible, AttributeSet, CookieAttributePolicy, CookieContext};
use crate::session::token_store::TokenStore;
use crate::settings::Settings;
use crate::utils::logging::LoggingHelper;

// Non-empty, no control characters, no cookie field separator
static USER_ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\x00-\x1F\x7F|]+$").unwrap());

/// Stages of one issuance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueStage {
    Requested,
    TokenBound,
    Encoded,
    Emitted,
}

impl fmt::Display for IssueStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Requested => "requested",
            Self::TokenBound => "token-bound",
            Self::Encoded => "encoded",
            Self::Emitted => "emitted",
        };
        f.write_str(name)
    }
}

/// Session lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLifetimes {
    pub remember: Duration,
    pub default: Duration,
    /// Extra time a remembered cookie is kept and accepted after expiring
    pub grace: Duration,
}

impl Default for SessionLifetimes {
    fn default() -> Self {
        Self {
            remember: Duration::days(14),
            default: Duration::days(2),
            grace: Duration::hours(12),
        }
    }
}

/// Inputs for one issuance
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub user_id: String,
    pub remember: bool,
    /// Explicit transport security; `None` derives it from the request
    pub secure: Option<bool>,
    /// Existing token to reuse (renewal)
    pub token: Option<String>,
    pub request_is_https: bool,
    pub now: DateTime<Utc>,
}

impl IssueRequest {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            remember: false,
            secure: None,
            token: None,
            request_is_https: false,
            now: Utc::now(),
        }
    }

    #[must_use]
    pub fn remember(mut self, remember: bool) -> Self {
        self.remember = remember;
        self
    }

    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn over_https(mut self, request_is_https: bool) -> Self {
        self.request_is_https = request_is_https;
        self
    }

    #[must_use]
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

/// Result of an issuance: the session and the cookies to set, in order
///
/// `directives` is empty when the emit hook vetoed; `session` is still bound.
#[derive(Debug, Clone)]
pub struct Issuance {
    pub session: Session,
    pub directives: Vec<CookieDirective>,
}

impl Issuance {
    #[must_use]
    pub fn is_emitted(&self) -> bool {
        !self.directives.is_empty()
    }
}

#[derive(Clone)]
pub struct SessionIssuer {
    store: Arc<dyn TokenStore>,
    codec: CookieCodec,
    policy: CookieAttributePolicy,
    names: CookieNames,
    lifetimes: SessionLifetimes,
    hooks: Arc<dyn SessionHooks>,
}

impl SessionIssuer {
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStore>,
        codec: CookieCodec,
        policy: CookieAttributePolicy,
        names: CookieNames,
    ) -> Self {
        Self {
            store,
            codec,
            policy,
            names,
            lifetimes: SessionLifetimes::default(),
            hooks: Arc::new(DefaultHooks),
        }
    }

    /// Build an issuer from settings
    ///
    /// # Errors
    ///
    /// Returns an error if the home URL is invalid, the secret is empty or a
    /// configured lifetime is not positive or out of range
    pub fn from_settings(settings: &Settings, store: Arc<dyn TokenStore>) -> anyhow::Result<Self> {
        let codec = CookieCodec::new(settings.session.session_secret.as_bytes())
            .context("Failed to initialize cookie codec")?;
        let policy = CookieAttributePolicy::new(CookieContext::from_settings(settings)?);

        let session = &settings.session;
        let lifetimes = SessionLifetimes {
            remember: positive_lifetime("remember_days", session.remember_days, Duration::try_days)?,
            default: positive_lifetime("default_days", session.default_days, Duration::try_days)?,
            grace: positive_lifetime("grace_hours", session.grace_hours, Duration::try_hours)?,
        };

        Ok(Self::new(store, codec, policy, settings.cookie_names()).with_lifetimes(lifetimes))
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn SessionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn with_lifetimes(mut self, lifetimes: SessionLifetimes) -> Self {
        self.lifetimes = lifetimes;
        self
    }

    #[must_use]
    pub fn store(&self) -> &dyn TokenStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn codec(&self) -> &CookieCodec {
        &self.codec
    }

    #[must_use]
    pub fn names(&self) -> &CookieNames {
        &self.names
    }

    /// Issue (or renew, when `request.token` is set) a session
    ///
    /// # Errors
    ///
    /// - `InvalidUser` if the user id is empty or malformed
    /// - `InvalidLifetime` if the session length is not positive or overflows
    /// - `AttributeConflict` if a cookie would be `SameSite=None` without `Secure`
    /// - `StorageUnavailable` if the token store cannot be written
    pub fn issue(&self, request: &IssueRequest) -> Result<Issuance, SessionError> {
        let user_id = request.user_id.as_str();

        // Requested
        if !USER_ID_PATTERN.is_match(user_id) {
            let error = SessionError::InvalidUser(user_id.to_string());
            LoggingHelper::log_issuance_failed(user_id, IssueStage::Requested, &error);
            return Err(error);
        }

        let default_length = if request.remember {
            self.lifetimes.remember
        } else {
            self.lifetimes.default
        };
        let length = self
            .hooks
            .auth_cookie_expiration(user_id, request.remember, default_length);
        let grace = request.remember.then_some(self.lifetimes.grace);

        let attributes = self.attributes(request);
        let scheme = CookieScheme::for_auth(attributes.secure);

        // Refuse before binding a token that could never be emitted
        self.ensure_emittable(scheme, &attributes)
            .inspect_err(|error| {
                LoggingHelper::log_issuance_failed(user_id, IssueStage::Requested, error);
            })?;

        let (expires_at, grace_until) = expiration_for(request.now, length, grace)
            .inspect_err(|error| {
                LoggingHelper::log_issuance_failed(user_id, IssueStage::Requested, error);
            })?;

        // TokenBound
        let token = if let Some(token) = &request.token {
            LoggingHelper::log_session_renewed(user_id);
            token.clone()
        } else {
            self.store
                .create(user_id, expires_at, grace_until)
                .inspect_err(|error| {
                    LoggingHelper::log_issuance_failed(
                        user_id,
                        IssueStage::TokenBound,
                        error,
                    );
                })?
        };
        let session = Session::new(user_id, token, expires_at, grace);

        // Encoded
        let (auth_value, logged_in_value) = self
            .encode_pair(&session, scheme)
            .inspect_err(|error| {
                LoggingHelper::log_issuance_failed(user_id, IssueStage::Encoded, error);
            })?;

        let expire = session.cookie_expiry();
        self.hooks.on_auth_cookie(&CookieEvent {
            value: &auth_value,
            expire,
            expiration: expires_at,
            user_id,
            scheme,
            token: &session.token,
        });
        self.hooks.on_logged_in_cookie(&CookieEvent {
            value: &logged_in_value,
            expire,
            expiration: expires_at,
            user_id,
            scheme: CookieScheme::LoggedIn,
            token: &session.token,
        });

        // Emitted
        let context = EmitContext {
            user_id,
            expire,
            expiration: Some(expires_at),
            scheme: Some(scheme),
            token: Some(&session.token),
        };
        if !self.hooks.should_emit(&context) {
            LoggingHelper::log_emission_vetoed(user_id);
            return Ok(Issuance {
                session,
                directives: Vec::new(),
            });
        }

        let directives = self
            .assemble(scheme, &attributes, &auth_value, &logged_in_value, expire)
            .inspect_err(|error| {
                LoggingHelper::log_issuance_failed(user_id, IssueStage::Emitted, error);
            })?;

        LoggingHelper::log_session_issued(user_id, scheme, request.remember, directives.len());
        Ok(Issuance {
            session,
            directives,
        })
    }

    fn attributes(&self, request: &IssueRequest) -> AttributeSet {
        let mut attributes = self
            .policy
            .attributes_for(request.secure, request.request_is_https);
        attributes.secure = self
            .hooks
            .secure_auth_cookie(attributes.secure, &request.user_id);
        attributes.secure_logged_in = self.hooks.secure_logged_in_cookie(
            attributes.secure_logged_in,
            &request.user_id,
            attributes.secure,
        );
        attributes
    }

    fn ensure_emittable(&self, scheme: CookieScheme, attributes: &AttributeSet) -> Result<(), SessionError> {
        ensure_compatible(self.names.name_for(scheme), attributes.secure, attributes.same_site)?;
        ensure_compatible(
            self.names.name_for(CookieScheme::LoggedIn),
            attributes.secure_logged_in,
            attributes.same_site,
        )
    }

    fn encode_pair(&self, session: &Session, scheme: CookieScheme) -> Result<(String, String), SessionError> {
        let auth = self
            .codec
            .encode(&session.user_id, session.expires_at, scheme, &session.token)?;
        let logged_in = self.codec.encode(
            &session.user_id,
            session.expires_at,
            CookieScheme::LoggedIn,
            &session.token,
        )?;
        Ok((auth, logged_in))
    }

    fn assemble(
        &self,
        scheme: CookieScheme,
        attributes: &AttributeSet,
        auth_value: &str,
        logged_in_value: &str,
        expire: Expiry,
    ) -> Result<Vec<CookieDirective>, SessionError> {
        let domain = self.policy.context().domain.clone();

        let auth = attributes.auth_paths.iter().map(|path| {
            CookieDirective::new(
                self.names.name_for(scheme),
                auth_value,
                path.as_str(),
                domain.clone(),
                expire,
                attributes.secure,
                attributes.same_site,
            )
        });
        let logged_in = attributes.logged_in_paths.iter().map(|path| {
            CookieDirective::new(
                self.names.name_for(CookieScheme::LoggedIn),
                logged_in_value,
                path.as_str(),
                domain.clone(),
                expire,
                attributes.secure_logged_in,
                attributes.same_site,
            )
        });

        auth.chain(logged_in).collect()
    }

    /// Directives that expire every session cookie at every placement
    ///
    /// # Errors
    ///
    /// Returns `AttributeConflict` when the request is not HTTPS, since a
    /// `SameSite=None` cookie can only be replaced by a secure one
    pub fn clear(&self, request_is_https: bool, now: DateTime<Utc>) -> Result<Vec<CookieDirective>, SessionError> {
        if !self.hooks.should_emit(&EmitContext::clearing()) {
            LoggingHelper::log_emission_vetoed("");
            return Ok(Vec::new());
        }

        let attributes = self.policy.attributes_for(Some(request_is_https), request_is_https);
        let domain = self.policy.context().domain.clone();
        let expire = Expiry::At(now - Duration::days(365));

        let mut directives = Vec::new();
        for scheme in [CookieScheme::Auth, CookieScheme::SecureAuth] {
            for path in &attributes.auth_paths {
                directives.push(CookieDirective::new(
                    self.names.name_for(scheme),
                    "",
                    path.as_str(),
                    domain.clone(),
                    expire,
                    request_is_https,
                    attributes.same_site,
                )?);
            }
        }
        for path in &attributes.logged_in_paths {
            directives.push(CookieDirective::new(
                self.names.name_for(CookieScheme::LoggedIn),
                "",
                path.as_str(),
                domain.clone(),
                expire,
                request_is_https,
                attributes.same_site,
            )?);
        }

        LoggingHelper::log_cookies_cleared(directives.len());
        Ok(directives)
    }

    /// Revoke the session behind a logged-in cookie and clear all cookies
    ///
    /// An unreadable or forged cookie is not an error here; cookies are still
    /// cleared.
    ///
    /// The clearing directives are built before anything is revoked, so a
    /// failed sign-out leaves the session bound.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::clear`], or `StorageUnavailable` if
    /// revocation fails
    pub fn sign_out(
        &self,
        logged_in_value: Option<&str>,
        request_is_https: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<CookieDirective>, SessionError> {
        let directives = self.clear(request_is_https, now)?;

        if let Some(value) = logged_in_value {
            match self.codec.decode_with_grace(value, now, self.lifetimes.grace) {
                Ok(decoded) => {
                    self.store.revoke(&decoded.token)?;
                    LoggingHelper::log_session_revoked(&decoded.user_id);
                }
                Err(error) => LoggingHelper::log_validation_failed(CookieScheme::LoggedIn, &error),
            }
        }

        Ok(directives)
    }

    /// Validate a cookie value of the given scheme against the token store
    ///
    /// Expired cookies are accepted within the grace window only when the
    /// session was remembered.
    ///
    /// # Errors
    ///
    /// `MalformedCookie`, `InvalidSignature`, `SchemeMismatch`, `SessionNotFound`,
    /// `Expired` or `StorageUnavailable`
    pub fn validate(&self, value: &str, scheme: CookieScheme, now: DateTime<Utc>) -> Result<Session, SessionError> {
        self.validate_inner(value, scheme, now)
            .inspect_err(|error| LoggingHelper::log_validation_failed(scheme, error))
    }

    fn validate_inner(&self, value: &str, scheme: CookieScheme, now: DateTime<Utc>) -> Result<Session, SessionError> {
        let decoded = self.codec.decode_with_grace(value, now, self.lifetimes.grace)?;
        if decoded.scheme != scheme {
            return Err(SessionError::SchemeMismatch {
                expected: scheme.to_string(),
                found: decoded.scheme.to_string(),
            });
        }

        let stored = self.store.lookup(&decoded.token)?;
        if stored.user_id != decoded.user_id {
            return Err(SessionError::SessionNotFound);
        }

        let grace = stored.grace_until.map(|_| self.lifetimes.grace);
        let session = Session::new(decoded.user_id, decoded.token, decoded.expires_at, grace);
        if !session.is_within_grace(now) {
            return Err(SessionError::Expired(session.expires_at));
        }

        Ok(session)
    }
}

fn positive_lifetime(
    key: &str,
    value: i64,
    to_duration: fn(i64) -> Option<Duration>,
) -> anyhow::Result<Duration> {
    if value <= 0 {
        anyhow::bail!("Session setting {key} must be positive, got {value}");
    }
    to_duration(value).with_context(|| format!("Session setting {key} is out of range: {value}"))
}

/// Expiration and optional grace deadline, refusing lifetimes that are not
/// positive or overflow the calendar
fn expiration_for(
    now: DateTime<Utc>,
    length: Duration,
    grace: Option<Duration>,
) -> Result<(DateTime<Utc>, Option<DateTime<Utc>>), SessionError> {
    if length <= Duration::zero() {
        return Err(SessionError::InvalidLifetime(format!(
            "session length must be positive, got {length}"
        )));
    }
    let expires_at = now
        .checked_add_signed(length)
        .ok_or_else(|| SessionError::InvalidLifetime(format!("session length {length} overflows")))?;
    let grace_until = grace
        .map(|grace| {
            expires_at
                .checked_add_signed(grace)
                .ok_or_else(|| SessionError::InvalidLifetime(format!("grace {grace} overflows")))
        })
        .transpose()?;

    Ok((expires_at, grace_until))
}
