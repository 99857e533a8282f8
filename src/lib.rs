#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the samesite-session crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod models;
pub mod session;
pub mod settings;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use models::Session;
pub use session::{
    CookieDirective, InMemoryTokenStore, IssueRequest, Issuance, SessionError, SessionIssuer,
    TokenStore,
};
pub use settings::Settings;
