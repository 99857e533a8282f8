//! Signed cookie values
//!
//! A cookie value packs `user|expiration|scheme|token|mac`, where `mac` is a
//! base64url HMAC-SHA256 over the first four fields. Each scheme signs with
//! its own subkey derived from the process secret, so an auth cookie value is
//! never accepted as a logged-in cookie. Encoding is deterministic.

use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::session::cookie::CookieScheme;
use crate::session::error::SessionError;
use crate::utils::crypto::hmac_sha256;

type HmacSha256 = Hmac<Sha256>;

const SEPARATOR: char = '|';

/// Fields recovered from a verified cookie value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCookie {
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub scheme: CookieScheme,
    pub token: String,
}

/// Encodes and verifies signed cookie values
///
/// The secret is fixed for the lifetime of the codec. Constructing a codec
/// with a different secret invalidates every outstanding cookie.
#[derive(Clone)]
pub struct CookieCodec {
    auth: HmacSha256,
    secure_auth: HmacSha256,
    logged_in: HmacSha256,
}

impl CookieCodec {
    /// Create a codec, deriving one signing subkey per scheme from `secret`
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is empty or key derivation fails
    pub fn new(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            anyhow::bail!("Cookie signing secret must not be empty");
        }

        let keyed = |scheme: CookieScheme| -> Result<HmacSha256> {
            let subkey = hmac_sha256(secret, scheme.as_str().as_bytes())?;
            Ok(<HmacSha256 as Mac>::new_from_slice(&subkey)?)
        };

        Ok(Self {
            auth: keyed(CookieScheme::Auth)?,
            secure_auth: keyed(CookieScheme::SecureAuth)?,
            logged_in: keyed(CookieScheme::LoggedIn)?,
        })
    }

    fn mac_for(&self, scheme: CookieScheme) -> HmacSha256 {
        match scheme {
            CookieScheme::Auth => self.auth.clone(),
            CookieScheme::SecureAuth => self.secure_auth.clone(),
            CookieScheme::LoggedIn => self.logged_in.clone(),
        }
    }

    /// Pack and sign a cookie value
    ///
    /// # Errors
    ///
    /// Returns `InvalidUser` if the user id is empty or contains the field
    /// separator, `MalformedCookie` if the token does
    pub fn encode(
        &self,
        user_id: &str,
        expires_at: DateTime<Utc>,
        scheme: CookieScheme,
        token: &str,
    ) -> Result<String, SessionError> {
        if user_id.is_empty() || user_id.contains(SEPARATOR) {
            return Err(SessionError::InvalidUser(user_id.to_string()));
        }
        if token.is_empty() || token.contains(SEPARATOR) {
            return Err(SessionError::MalformedCookie("token contains separator"));
        }

        let payload = format!(
            "{user_id}{SEPARATOR}{}{SEPARATOR}{scheme}{SEPARATOR}{token}",
            expires_at.timestamp()
        );

        let mut mac = self.mac_for(scheme);
        mac.update(payload.as_bytes());
        let signature = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{payload}{SEPARATOR}{signature}"))
    }

    /// Verify a cookie value and reject it once expired
    ///
    /// # Errors
    ///
    /// Returns `MalformedCookie`, `InvalidSignature` or `Expired`
    pub fn decode(&self, value: &str, now: DateTime<Utc>) -> Result<DecodedCookie, SessionError> {
        self.decode_with_grace(value, now, Duration::zero())
    }

    /// Verify a cookie value, accepting it until `grace` past its expiration
    ///
    /// # Errors
    ///
    /// Returns `MalformedCookie`, `InvalidSignature` or `Expired`
    pub fn decode_with_grace(
        &self,
        value: &str,
        now: DateTime<Utc>,
        grace: Duration,
    ) -> Result<DecodedCookie, SessionError> {
        let (payload, signature) = value
            .rsplit_once(SEPARATOR)
            .ok_or(SessionError::MalformedCookie("missing signature"))?;

        let fields: Vec<&str> = payload.split(SEPARATOR).collect();
        let [user_id, expiration, scheme, token] = fields.as_slice() else {
            return Err(SessionError::MalformedCookie("expected five fields"));
        };

        let scheme: CookieScheme = scheme.parse()?;
        let expiration: i64 = expiration
            .parse()
            .map_err(|_| SessionError::MalformedCookie("expiration is not a number"))?;

        let signature = general_purpose::URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SessionError::InvalidSignature)?;
        let mut mac = self.mac_for(scheme);
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SessionError::InvalidSignature)?;

        let expires_at = DateTime::from_timestamp(expiration, 0)
            .ok_or(SessionError::MalformedCookie("expiration out of range"))?;
        if now > expires_at + grace {
            return Err(SessionError::Expired(expires_at));
        }

        Ok(DecodedCookie {
            user_id: (*user_id).to_string(),
            expires_at,
            scheme,
            token: (*token).to_string(),
        })
    }
}
