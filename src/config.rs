//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)
//! 4. Legacy environment variables (`PORT`, `SESSION_SECRET`, `GOOGLE_KEY`, ...)

use serde::Deserialize;
use std::{collections::BTreeMap, net::IpAddr, path::PathBuf};

/// Provider keys that may be configured through `<KEY>_KEY` / `<KEY>_SECRET`
/// environment variables.
const LEGACY_PROVIDER_ENV: &[(&str, &str)] = &[("google", "GOOGLE"), ("github", "GITHUB"), ("vk", "VK")];

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub assets: AssetsConfig,
    pub site: SiteConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "login.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the public base URL
    ///
    /// # Returns
    /// Full URL like "https://login.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Session and provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes)
    pub session_secret: String,
    /// Session max age in seconds (default: 604800 = 7 days)
    pub session_max_age: i64,
    /// Name of the session cookie
    pub session_cookie: String,
    /// Timeout for calls to a provider's token and profile endpoints
    pub upstream_timeout_seconds: u64,
    /// Enabled providers keyed by provider key ("google", "github", ...)
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

/// OAuth client registration for one provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Name shown on the home page (falls back to the preset's name)
    pub display_name: Option<String>,
    /// Requested scopes (falls back to the preset's scopes)
    pub scopes: Option<Vec<String>>,
    /// Endpoint overrides; required for keys without a built-in preset
    pub auth_url: Option<String>,
    pub token_url: Option<String>,
    pub userinfo_url: Option<String>,
}

/// Static file serving
#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    /// Directory served as-is
    pub dir: PathBuf,
    /// URL prefixes the directory is mounted under
    pub mount_paths: Vec<String>,
}

impl AssetsConfig {
    /// `style.css` under the first mount path, if any directory is mounted
    pub fn stylesheet_url(&self) -> Option<String> {
        self.mount_paths
            .first()
            .map(|mount| format!("{mount}/style.css"))
    }
}

/// Page metadata
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub title: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (SOCIALGATE__*)
    /// 5. Legacy variables: PORT, SESSION_SECRET, GOOGLE_KEY/GOOGLE_SECRET,
    ///    GITHUB_KEY/GITHUB_SECRET, VK_KEY/VK_SECRET
    ///
    /// # Errors
    /// Returns error if configuration is missing or invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.domain", "localhost:8080")?
            .set_default("server.protocol", "http")?
            .set_default("auth.session_max_age", 604800)?
            .set_default("auth.session_cookie", "session")?
            .set_default("auth.upstream_timeout_seconds", 10)?
            .set_default("assets.dir", "assets")?
            .set_default("assets.mount_paths", vec!["/assets", "/src"])?
            .set_default("site.title", "socialgate")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("SOCIALGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .set_override_option("auth.session_secret", std::env::var("SESSION_SECRET").ok())?;

        for (key, prefix) in LEGACY_PROVIDER_ENV {
            builder = builder
                .set_override_option(
                    format!("auth.providers.{key}.client_id"),
                    std::env::var(format!("{prefix}_KEY")).ok(),
                )?
                .set_override_option(
                    format!("auth.providers.{key}.client_secret"),
                    std::env::var(format!("{prefix}_SECRET")).ok(),
                )?;
        }

        let config = builder
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    /// Callback URL registered with a provider
    pub fn callback_url(&self, provider: &str) -> String {
        format!("{}/auth/{}/callback", self.server.base_url(), provider)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.as_bytes().len() < MIN_SESSION_SECRET_BYTES {
            return Err(AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 {
            return Err(AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if self.auth.session_cookie.trim().is_empty() {
            return Err(AppError::Config(
                "auth.session_cookie must not be empty".to_string(),
            ));
        }

        if self.auth.upstream_timeout_seconds == 0 {
            return Err(AppError::Config(
                "auth.upstream_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.auth.providers.is_empty() {
            return Err(AppError::Config(
                "at least one provider must be configured under auth.providers".to_string(),
            ));
        }

        for (key, provider) in &self.auth.providers {
            if key.is_empty()
                || !key
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
            {
                return Err(AppError::Config(format!(
                    "auth.providers.{key}: provider keys may only contain a-z, 0-9, '-' and '_'"
                )));
            }
            if provider.client_id.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "auth.providers.{key}.client_id must not be empty"
                )));
            }
            if provider.client_secret.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "auth.providers.{key}.client_secret must not be empty"
                )));
            }
            for (field, value) in [
                ("auth_url", &provider.auth_url),
                ("token_url", &provider.token_url),
                ("userinfo_url", &provider.userinfo_url),
            ] {
                if let Some(value) = value {
                    url::Url::parse(value).map_err(|e| {
                        AppError::Config(format!("auth.providers.{key}.{field} is invalid: {e}"))
                    })?;
                }
            }
        }

        for mount in &self.assets.mount_paths {
            if !mount.starts_with('/') || mount.len() < 2 || mount.ends_with('/') {
                return Err(AppError::Config(format!(
                    "assets.mount_paths entry {mount:?} must look like \"/assets\""
                )));
            }
        }

        if !self.should_use_secure_cookies() {
            let host = normalized_server_host(&self.server.domain);
            tracing::warn!(
                host = %host,
                protocol = %self.server.protocol,
                "Using insecure session cookies for local development"
            );
        } else if !self.server.protocol.eq_ignore_ascii_case("https") {
            return Err(AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
