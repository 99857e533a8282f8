//! Session Cookie Module
//!
//! Issues, renews, validates and clears session cookies that remain usable
//! from inside a cross-site iframe.
//!
//! # Modules
//!
//! - [`token_store`] - Token bindings with insert-if-absent creation
//! - [`codec`] - Signed, deterministic cookie values
//! - [`policy`] - Secure/SameSite attributes and path placement
//! - [`issuer`] - Issuance pipeline, clearing, sign-out and validation
//! - [`hooks`] - Overrides, observers and the emit veto
//! - [`cookie`] - Cookie directives and conversion to actix cookies
//! - [`error`] - Session error taxonomy

pub mod codec;
pub mod cookie;
pub mod error;
pub mod hooks;
pub mod issuer;
pub mod policy;
pub mod token_store;

// Re-export commonly used items for convenience
pub use codec::{CookieCodec, DecodedCookie};
pub use cookie::{append_cookies, CookieDirective, CookieNames, CookieScheme, Expiry};
pub use error::SessionError;
pub use hooks::{CookieEvent, DefaultHooks, EmitContext, SessionHooks};
pub use issuer::{IssueRequest, IssueStage, Issuance, SessionIssuer, SessionLifetimes};
pub use policy::{AttributeSet, CookieAttributePolicy, CookieContext};
pub use token_store::{InMemoryTokenStore, TokenBinding, TokenStore};
