// Cryptographic utilities for generating session tokens and signing cookie payloads

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Session token size in bytes (256 bits, 43 characters once encoded)
pub const TOKEN_BYTES: usize = 32;

/// Generated secret size in bytes
pub const SECRET_BYTES: usize = 32;

/// Generate a cryptographically secure session token
///
/// The token is `TOKEN_BYTES` of random data encoded as base64url without
/// padding, so it never contains the `|` field separator used by cookie values.
#[must_use]
pub fn generate_token() -> String {
    let mut token = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut token);
    general_purpose::URL_SAFE_NO_PAD.encode(token)
}

/// Generate a random signing secret, standard base64 encoded
#[must_use]
pub fn generate_secret() -> String {
    let mut secret = [0u8; SECRET_BYTES];
    rand::rng().fill_bytes(&mut secret);
    general_purpose::STANDARD.encode(secret)
}

/// Compute HMAC-SHA256 of `message` keyed with `key`
///
/// # Errors
///
/// Returns an error if HMAC computation fails
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).context("Invalid HMAC key length")?;
    mac.update(message);

    Ok(mac.finalize().into_bytes().to_vec())
}

/// Hash a session token into the verifier used as the storage key
///
/// Stores never hold raw tokens, so a leaked table cannot be replayed as cookies.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

/// Lowercase hex SHA-256 of the site URL, truncated to 32 characters
///
/// Used as the suffix for default cookie names so several sites on one domain
/// don't share cookies.
#[must_use]
pub fn site_hash(site_url: &str) -> String {
    Sha256::digest(site_url.as_bytes())
        .iter()
        .take(16)
        .map(|b| format!("{b:02x}"))
        .collect()
}
