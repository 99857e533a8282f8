use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::session::cookie::{CookieNames, DEFAULT_COOKIE_PREFIX};
use crate::utils::crypto::generate_secret;

/// Environment variable naming a directory with an overriding Settings.toml
pub const SECRETS_DIR_ENV: &str = "SAMESITE_SECRETS_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub site: SiteSettings,
    pub session: SessionSettings,
    pub cookies: CookieSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    /// Canonical home URL; its scheme decides whether the logged-in cookie is secure
    pub home_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub session_secret: String,
    /// Session lifetime when "remember me" is set
    pub remember_days: i64,
    /// Session lifetime otherwise
    pub default_days: i64,
    /// How long past expiration a remembered cookie is still kept and accepted
    pub grace_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    /// Cookie domain; unset or empty means host-only cookies
    pub domain: Option<String>,
    pub admin_cookie_path: String,
    pub plugins_cookie_path: String,
    pub cookie_path: String,
    pub site_cookie_path: String,
    /// Prefix for derived cookie names
    pub prefix: String,
    // Explicit names, derived from prefix and home URL when unset
    pub auth_cookie_name: Option<String>,
    pub secure_auth_cookie_name: Option<String>,
    pub logged_in_cookie_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            home_url: "https://localhost".to_string(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_secret: String::new(), // Will be generated if empty
            remember_days: 14,
            default_days: 2,
            grace_hours: 12,
        }
    }
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            domain: None,
            admin_cookie_path: "/wp-admin".to_string(),
            plugins_cookie_path: "/wp-content/plugins".to_string(),
            cookie_path: "/".to_string(),
            site_cookie_path: "/".to_string(),
            prefix: DEFAULT_COOKIE_PREFIX.to_string(),
            auth_cookie_name: None,
            secure_auth_cookie_name: None,
            logged_in_cookie_name: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from configuration files and environment variables,
    /// then initialize logging
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A settings file cannot be read or parsed
    /// - Logger initialization fails
    pub fn load() -> Result<Self> {
        Self::load_env_file();

        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);

        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(settings.logging.level.as_str()),
        )
        .try_init()
        .context("Failed to initialize logger")?;

        Ok(settings)
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `SAMESITE_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file cannot be read or parsed
    fn load_base_settings() -> Result<Self> {
        let mut settings = Self::default();

        let default_config_path = Path::new("Settings.toml");
        if default_config_path.exists() {
            settings = Self::load_from_file(default_config_path)?;
            println!(
                "✓ Loaded base settings from {}",
                default_config_path.display()
            );
        }

        if let Ok(secrets_dir) = std::env::var(SECRETS_DIR_ENV) {
            let secrets_path = Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                settings = Self::load_from_file(&secrets_path)?;
                println!("✓ Overriding settings from {}", secrets_path.display());
            } else {
                println!(
                    "ℹ {SECRETS_DIR_ENV} set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Parse a single TOML settings file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        basic_toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        if let Ok(home_url) = std::env::var("HOME_URL") {
            settings.site.home_url = home_url;
        }
        Self::apply_session_env_overrides(&mut settings.session);
        Self::apply_cookie_env_overrides(&mut settings.cookies);
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            settings.logging.level = log_level;
        }
    }

    /// Apply environment overrides for session settings
    pub fn apply_session_env_overrides(session_settings: &mut SessionSettings) {
        Self::apply_numeric_env_override("SESSION_REMEMBER_DAYS", &mut session_settings.remember_days);
        Self::apply_numeric_env_override("SESSION_DEFAULT_DAYS", &mut session_settings.default_days);
        Self::apply_numeric_env_override("SESSION_GRACE_HOURS", &mut session_settings.grace_hours);

        Self::handle_session_secret_override(session_settings);
    }

    /// Apply environment overrides for cookie placement
    pub fn apply_cookie_env_overrides(cookie_settings: &mut CookieSettings) {
        if let Ok(domain) = std::env::var("COOKIE_DOMAIN") {
            cookie_settings.domain = Some(domain);
        }
        Self::apply_string_env_override("ADMIN_COOKIE_PATH", &mut cookie_settings.admin_cookie_path);
        Self::apply_string_env_override("PLUGINS_COOKIE_PATH", &mut cookie_settings.plugins_cookie_path);
        Self::apply_string_env_override("COOKIEPATH", &mut cookie_settings.cookie_path);
        Self::apply_string_env_override("SITECOOKIEPATH", &mut cookie_settings.site_cookie_path);
    }

    fn apply_numeric_env_override(env_var: &str, target: &mut i64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<i64>() {
                *target = value;
            }
        }
    }

    fn apply_string_env_override(env_var: &str, target: &mut String) {
        if let Ok(value) = std::env::var(env_var) {
            if !value.is_empty() {
                *target = value;
            }
        }
    }

    /// Helper function to handle session secret environment override and generation
    fn handle_session_secret_override(session_settings: &mut SessionSettings) {
        let env_secret_set = std::env::var("SESSION_SECRET").is_ok_and(|secret| {
            if secret.is_empty() {
                false
            } else {
                session_settings.session_secret = secret;
                true
            }
        });

        if !env_secret_set && session_settings.session_secret.is_empty() {
            session_settings.session_secret = generate_secret();
            Self::warn_about_generated_secret();
        }
    }

    fn warn_about_generated_secret() {
        eprintln!("⚠️  WARNING: Using auto-generated session secret");
        eprintln!("🔒 For production use, set the SESSION_SECRET environment variable");
        eprintln!("   or configure session_secret in Settings.toml");
        eprintln!("💡 Every issued cookie becomes invalid when the process restarts");
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Cookie names, explicit ones taking precedence over derived ones
    #[must_use]
    pub fn cookie_names(&self) -> CookieNames {
        let derived = CookieNames::derive(&self.cookies.prefix, &self.site.home_url);
        CookieNames {
            auth: self.cookies.auth_cookie_name.clone().unwrap_or(derived.auth),
            secure_auth: self
                .cookies
                .secure_auth_cookie_name
                .clone()
                .unwrap_or(derived.secure_auth),
            logged_in: self
                .cookies
                .logged_in_cookie_name
                .clone()
                .unwrap_or(derived.logged_in),
        }
    }
}
