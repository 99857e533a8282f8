use std::fmt;
use std::str::FromStr;

use actix_web::cookie::{time::OffsetDateTime, Cookie, SameSite};
use actix_web::HttpResponseBuilder;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::session::error::SessionError;
use crate::session::policy::ensure_compatible;
use crate::utils::crypto::site_hash;

/// Default prefix for derived cookie names
pub const DEFAULT_COOKIE_PREFIX: &str = "session";

/// Which logical cookie a token backs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CookieScheme {
    Auth,
    SecureAuth,
    LoggedIn,
}

impl CookieScheme {
    pub const ALL: [Self; 3] = [Self::Auth, Self::SecureAuth, Self::LoggedIn];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::SecureAuth => "secure_auth",
            Self::LoggedIn => "logged_in",
        }
    }

    /// Scheme of the authentication cookie for the given transport security
    #[must_use]
    pub fn for_auth(secure: bool) -> Self {
        if secure {
            Self::SecureAuth
        } else {
            Self::Auth
        }
    }
}

impl fmt::Display for CookieScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CookieScheme {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auth" => Ok(Self::Auth),
            "secure_auth" => Ok(Self::SecureAuth),
            "logged_in" => Ok(Self::LoggedIn),
            _ => Err(SessionError::MalformedCookie("unknown scheme")),
        }
    }
}

/// Cookie names per scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieNames {
    pub auth: String,
    pub secure_auth: String,
    pub logged_in: String,
}

impl CookieNames {
    /// Derive names from a prefix and a hash of the site URL
    #[must_use]
    pub fn derive(prefix: &str, site_url: &str) -> Self {
        let hash = site_hash(site_url);
        Self {
            auth: format!("{prefix}_{hash}"),
            secure_auth: format!("{prefix}_sec_{hash}"),
            logged_in: format!("{prefix}_logged_in_{hash}"),
        }
    }

    #[must_use]
    pub fn name_for(&self, scheme: CookieScheme) -> &str {
        match scheme {
            CookieScheme::Auth => &self.auth,
            CookieScheme::SecureAuth => &self.secure_auth,
            CookieScheme::LoggedIn => &self.logged_in,
        }
    }
}

/// When the browser should drop a cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Dropped when the browser closes
    Session,
    At(DateTime<Utc>),
}

impl Expiry {
    /// Unix timestamp, `0` for session-only cookies
    #[must_use]
    pub fn as_unix(self) -> i64 {
        match self {
            Self::Session => 0,
            Self::At(at) => at.timestamp(),
        }
    }
}

/// One instruction to set or clear a cookie
///
/// Fields are private so a directive can only exist once its attributes have
/// passed [`ensure_compatible`]. `http_only` is always true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieDirective {
    name: String,
    value: String,
    path: String,
    domain: Option<String>,
    expire: Expiry,
    secure: bool,
    same_site: SameSite,
}

impl CookieDirective {
    /// Build a directive, rejecting attribute combinations browsers discard
    ///
    /// # Errors
    ///
    /// Returns `AttributeConflict` for `SameSite=None` without `Secure`
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        path: impl Into<String>,
        domain: Option<String>,
        expire: Expiry,
        secure: bool,
        same_site: SameSite,
    ) -> Result<Self, SessionError> {
        let name = name.into();
        ensure_compatible(&name, secure, same_site)?;

        Ok(Self {
            name,
            value: value.into(),
            path: path.into(),
            domain,
            expire,
            secure,
            same_site,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    #[must_use]
    pub fn expire(&self) -> Expiry {
        self.expire
    }

    #[must_use]
    pub fn secure(&self) -> bool {
        self.secure
    }

    #[must_use]
    pub fn http_only(&self) -> bool {
        true
    }

    #[must_use]
    pub fn same_site(&self) -> SameSite {
        self.same_site
    }

    /// Convert into an actix cookie ready for a `Set-Cookie` header
    ///
    /// # Errors
    ///
    /// Returns an error if the expiry timestamp is out of range
    pub fn to_cookie(&self) -> Result<Cookie<'static>> {
        let mut builder = Cookie::build(self.name.clone(), self.value.clone())
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(true)
            .same_site(self.same_site);

        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }

        if let Expiry::At(at) = self.expire {
            let expires = OffsetDateTime::from_unix_timestamp(at.timestamp())
                .with_context(|| format!("Cookie expiry out of range for {}", self.name))?;
            builder = builder.expires(expires);
        }

        Ok(builder.finish())
    }
}

/// Append one `Set-Cookie` header per directive, in order
///
/// # Errors
///
/// Returns an error if any directive cannot be converted; nothing is appended then
pub fn append_cookies(
    response: &mut HttpResponseBuilder,
    directives: &[CookieDirective],
) -> Result<()> {
    let cookies = directives
        .iter()
        .map(CookieDirective::to_cookie)
        .collect::<Result<Vec<_>>>()?;

    for cookie in cookies {
        response.cookie(cookie);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::SET_COOKIE;
    use actix_web::HttpResponse;
    use chrono::Duration;

    fn directive(path: &str, expire: Expiry) -> CookieDirective {
        CookieDirective::new(
            "session_sec_abc",
            "value",
            path,
            Some("example.com".to_string()),
            expire,
            true,
            SameSite::None,
        )
        .unwrap()
    }

    #[test]
    fn test_scheme_round_trip() {
        for scheme in CookieScheme::ALL {
            assert_eq!(scheme.as_str().parse::<CookieScheme>().unwrap(), scheme);
        }
        assert!("admin".parse::<CookieScheme>().is_err());
        assert_eq!(CookieScheme::for_auth(true), CookieScheme::SecureAuth);
        assert_eq!(CookieScheme::for_auth(false), CookieScheme::Auth);
    }

    #[test]
    fn test_derived_cookie_names() {
        let names = CookieNames::derive("session", "https://example.com");
        let hash = site_hash("https://example.com");

        assert_eq!(names.auth, format!("session_{hash}"));
        assert_eq!(names.secure_auth, format!("session_sec_{hash}"));
        assert_eq!(names.logged_in, format!("session_logged_in_{hash}"));
        assert_eq!(names.name_for(CookieScheme::LoggedIn), names.logged_in);
    }

    #[test]
    fn test_insecure_same_site_none_rejected() {
        let result = CookieDirective::new("c", "v", "/", None, Expiry::Session, false, SameSite::None);
        assert!(matches!(result, Err(SessionError::AttributeConflict(_))));
    }

    #[test]
    fn test_insecure_lax_allowed() {
        let directive =
            CookieDirective::new("c", "v", "/", None, Expiry::Session, false, SameSite::Lax).unwrap();
        assert!(!directive.secure());
        assert!(directive.http_only());
    }

    #[test]
    fn test_expiry_unix() {
        let at = Utc::now();
        assert_eq!(Expiry::Session.as_unix(), 0);
        assert_eq!(Expiry::At(at).as_unix(), at.timestamp());
    }

    #[test]
    fn test_to_cookie_session_only() {
        let cookie = directive("/wp-admin", Expiry::Session).to_cookie().unwrap();

        assert_eq!(cookie.name(), "session_sec_abc");
        assert_eq!(cookie.value(), "value");
        assert_eq!(cookie.path(), Some("/wp-admin"));
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert!(cookie.expires().is_none());
    }

    #[test]
    fn test_to_cookie_with_expiry() {
        let at = Utc::now() + Duration::days(14);
        let cookie = directive("/", Expiry::At(at)).to_cookie().unwrap();

        let expires = cookie.expires_datetime().unwrap();
        assert_eq!(expires.unix_timestamp(), at.timestamp());
    }

    #[test]
    fn test_append_cookies_keeps_order() {
        let directives = vec![
            directive("/wp-admin", Expiry::Session),
            directive("/wp-content/plugins", Expiry::Session),
        ];

        let mut builder = HttpResponse::Ok();
        append_cookies(&mut builder, &directives).unwrap();
        let response = builder.finish();

        let paths: Vec<String> = response
            .cookies()
            .map(|cookie| cookie.path().unwrap_or_default().to_string())
            .collect();
        assert_eq!(paths, vec!["/wp-admin", "/wp-content/plugins"]);
        assert_eq!(response.headers().get_all(SET_COOKIE).count(), 2);
    }
}
