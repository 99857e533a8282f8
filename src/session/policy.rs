//! Cookie attribute policy
//!
//! Computes the security attributes and path placement for session cookies.
//! Every cookie this policy produces carries `SameSite=None` so that sign-in
//! works from inside a cross-site iframe, which in turn requires `Secure`.

use actix_web::cookie::SameSite;
use anyhow::{Context, Result};
use log::warn;

use crate::session::error::SessionError;
use crate::settings::Settings;

/// Where and for which site cookies are placed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieContext {
    /// Scheme of the site's canonical home URL, lowercase
    pub home_url_scheme: String,
    /// Admin-area path for the authentication cookie
    pub admin_path: String,
    /// General (plugins) path for the authentication cookie
    pub plugins_path: String,
    /// Site cookie path for the logged-in cookie
    pub cookie_path: String,
    /// Site-wide cookie path, a second logged-in placement when it differs
    pub site_cookie_path: String,
    pub domain: Option<String>,
}

impl CookieContext {
    /// Build the context from settings, parsing the home URL scheme
    ///
    /// # Errors
    ///
    /// Returns an error if the configured home URL cannot be parsed
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let home = url::Url::parse(&settings.site.home_url)
            .with_context(|| format!("Invalid home URL: {}", settings.site.home_url))?;

        let cookies = &settings.cookies;
        Ok(Self {
            home_url_scheme: home.scheme().to_string(),
            admin_path: cookies.admin_cookie_path.clone(),
            plugins_path: cookies.plugins_cookie_path.clone(),
            cookie_path: cookies.cookie_path.clone(),
            site_cookie_path: cookies.site_cookie_path.clone(),
            domain: cookies.domain.clone().filter(|domain| !domain.is_empty()),
        })
    }
}

/// Attributes for one issuance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSet {
    /// Secure flag of the authentication cookie
    pub secure: bool,
    /// Secure flag of the logged-in cookie
    pub secure_logged_in: bool,
    pub same_site: SameSite,
    /// Paths of the authentication cookie, admin first
    pub auth_paths: Vec<String>,
    /// Paths of the logged-in cookie, without duplicates
    pub logged_in_paths: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CookieAttributePolicy {
    context: CookieContext,
}

impl CookieAttributePolicy {
    #[must_use]
    pub fn new(context: CookieContext) -> Self {
        Self { context }
    }

    #[must_use]
    pub fn context(&self) -> &CookieContext {
        &self.context
    }

    /// Compute attributes for a session cookie set
    ///
    /// `base_secure` is the caller's explicit transport security; `None` falls
    /// back to whether the current request is HTTPS. The logged-in cookie is
    /// only secure when the home URL is HTTPS as well.
    #[must_use]
    pub fn attributes_for(&self, base_secure: Option<bool>, request_is_https: bool) -> AttributeSet {
        let secure = base_secure.unwrap_or(request_is_https);
        let secure_logged_in = secure && self.context.home_url_scheme.eq_ignore_ascii_case("https");

        AttributeSet {
            secure,
            secure_logged_in,
            same_site: SameSite::None,
            auth_paths: vec![
                self.context.admin_path.clone(),
                self.context.plugins_path.clone(),
            ],
            logged_in_paths: self.logged_in_paths(),
        }
    }

    fn logged_in_paths(&self) -> Vec<String> {
        let mut paths = vec![self.context.cookie_path.clone()];
        if self.context.site_cookie_path != self.context.cookie_path {
            paths.push(self.context.site_cookie_path.clone());
        }
        paths
    }
}

/// Refuse attribute combinations a browser would silently discard
///
/// # Errors
///
/// Returns `AttributeConflict` when `SameSite=None` is paired with a
/// non-secure cookie
pub fn ensure_compatible(name: &str, secure: bool, same_site: SameSite) -> Result<(), SessionError> {
    if same_site == SameSite::None && !secure {
        warn!("Refusing to emit cookie '{name}': SameSite=None requires Secure");
        return Err(SessionError::AttributeConflict(format!(
            "cookie '{name}' has SameSite=None without Secure"
        )));
    }
    Ok(())
}
