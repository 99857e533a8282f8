//! Testing utilities shared by unit and integration tests
//!
//! - [`fixtures`] - Pre-built settings, contexts and issuers
//! - [`mock`] - Hooks and token stores with scripted behaviour
//!
//! ```rust
//! use samesite_session::testing::TestFixtures;
//! use samesite_session::IssueRequest;
//!
//! let issuer = TestFixtures::issuer();
//! let issuance = issuer.issue(&IssueRequest::new("u1").secure(true)).unwrap();
//! assert_eq!(issuance.directives.len(), 3);
//! ```

pub mod fixtures;
pub mod mock;

pub use fixtures::TestFixtures;
pub use mock::{FailingTokenStore, RecordingHooks};

/// Common test constants
pub mod constants {
    /// Default test user
    pub const TEST_USER_ID: &str = "u1";

    /// Default test home URL
    pub const TEST_HOME_URL: &str = "https://example.com";

    /// Default test cookie domain
    pub const TEST_COOKIE_DOMAIN: &str = "example.com";

    /// Test signing key for HMAC (256 bits)
    pub const TEST_SIGNING_KEY: &[u8] = b"test_key_32_bytes_long_for_test_";
}
