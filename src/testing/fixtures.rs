//! Test fixtures providing pre-built test objects

use std::sync::Arc;

use crate::session::{CookieAttributePolicy, CookieCodec, CookieContext, InMemoryTokenStore, SessionIssuer};
use crate::settings::{CookieSettings, SessionSettings, Settings, SiteSettings};

use super::constants::{TEST_COOKIE_DOMAIN, TEST_HOME_URL, TEST_SIGNING_KEY};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Single-site settings: cookie path and site cookie path are both `/`
    #[must_use]
    pub fn settings() -> Settings {
        Settings {
            site: SiteSettings {
                home_url: TEST_HOME_URL.to_string(),
            },
            session: SessionSettings {
                session_secret: String::from_utf8_lossy(TEST_SIGNING_KEY).into_owned(),
                ..Default::default()
            },
            cookies: CookieSettings {
                domain: Some(TEST_COOKIE_DOMAIN.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Settings for a site living under `/blog/` of a network
    #[must_use]
    pub fn multisite_settings() -> Settings {
        let mut settings = Self::settings();
        settings.site.home_url = format!("{TEST_HOME_URL}/blog");
        settings.cookies.cookie_path = "/blog/".to_string();
        settings
    }

    /// Cookie context matching [`Self::settings`]
    ///
    /// # Panics
    ///
    /// Panics if the fixture home URL is invalid
    #[must_use]
    pub fn cookie_context() -> CookieContext {
        CookieContext::from_settings(&Self::settings()).unwrap()
    }

    /// Issuer over a fresh in-memory store
    #[must_use]
    pub fn issuer() -> SessionIssuer {
        Self::issuer_from_settings(&Self::settings())
    }

    /// Issuer built from the given settings over a fresh in-memory store
    ///
    /// # Panics
    ///
    /// Panics if the settings are invalid
    #[must_use]
    pub fn issuer_from_settings(settings: &Settings) -> SessionIssuer {
        SessionIssuer::from_settings(settings, Arc::new(InMemoryTokenStore::new())).unwrap()
    }

    /// Issuer over the given store with fixture placement
    ///
    /// # Panics
    ///
    /// Panics if the fixture signing key is rejected
    #[must_use]
    pub fn issuer_with_store(store: Arc<dyn crate::session::TokenStore>) -> SessionIssuer {
        let settings = Self::settings();
        SessionIssuer::new(
            store,
            CookieCodec::new(TEST_SIGNING_KEY).unwrap(),
            CookieAttributePolicy::new(Self::cookie_context()),
            settings.cookie_names(),
        )
    }
}
