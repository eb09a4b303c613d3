//! Wallet configuration.
//!
//! Supplied once at construction, either through the builder methods or
//! loaded from environment variables with [`WalletConfig::from_env`].

use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Port used for the local development issuer when none is configured.
pub const DEFAULT_DEV_PORT: u16 = 8080;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Offending field
        field: String,
        /// Parse failure
        reason: String,
    },

    /// Invalid port number
    #[error("Invalid port: must be between 1 and 65535")]
    InvalidPort,

    /// Invalid duration value
    #[error("Invalid {field}: must be greater than 0")]
    InvalidDuration {
        /// Offending field
        field: String,
    },

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parse failure
        reason: String,
    },
}

/// Wallet configuration.
#[derive(Clone)]
pub struct WalletConfig {
    /// Base64-encoded JSON private JWK. Enables signing.
    pub private_key: Option<String>,
    /// Issuer URL. Enables remote JWKS verification.
    pub issuer: Option<String>,
    /// Base64-encoded JSON public JWK for local development verification.
    pub dev_public_key: Option<String>,
    /// Local development port; also triggers persist-and-exit when no keys are configured.
    pub dev_port: Option<u16>,
    /// How long a fetched remote JWKS stays fresh.
    pub jwks_cache_ttl: Duration,
    /// Minimum delay between refetches triggered by an unknown kid.
    pub jwks_cooldown: Duration,
    /// Timeout for a single JWKS request.
    pub jwks_timeout: Duration,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key: None,
            issuer: None,
            dev_public_key: None,
            dev_port: None,
            jwks_cache_ttl: Duration::from_secs(600),
            jwks_cooldown: Duration::from_secs(30),
            jwks_timeout: Duration::from_secs(5),
        }
    }
}

impl std::fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("issuer", &self.issuer)
            .field("dev_public_key", &self.dev_public_key.is_some())
            .field("dev_port", &self.dev_port)
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("jwks_cooldown", &self.jwks_cooldown)
            .field("jwks_timeout", &self.jwks_timeout)
            .finish()
    }
}

impl WalletConfig {
    /// Loads configuration from environment variables with validation.
    ///
    /// Reads `JWT_PRIVATE`, `JWT_ISSUER`, `JWT_MOCK_PUBLIC`, `JWT_DEV_PORT`,
    /// `JWKS_CACHE_TTL`, `JWKS_COOLDOWN` and `JWKS_TIMEOUT` (seconds).
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let dev_port = match optional_env("JWT_DEV_PORT") {
            Some(raw) => Some(raw.parse::<u16>().map_err(|e| ConfigError::ParseError {
                name: "JWT_DEV_PORT".to_string(),
                reason: e.to_string(),
            })?),
            None => None,
        };

        let config = Self {
            private_key: optional_env("JWT_PRIVATE"),
            issuer: optional_env("JWT_ISSUER"),
            dev_public_key: optional_env("JWT_MOCK_PUBLIC"),
            dev_port,
            jwks_cache_ttl: Duration::from_secs(parse_env(
                "JWKS_CACHE_TTL",
                defaults.jwks_cache_ttl.as_secs(),
            )?),
            jwks_cooldown: Duration::from_secs(parse_env(
                "JWKS_COOLDOWN",
                defaults.jwks_cooldown.as_secs(),
            )?),
            jwks_timeout: Duration::from_secs(parse_env(
                "JWKS_TIMEOUT",
                defaults.jwks_timeout.as_secs(),
            )?),
        };

        config.validate()?;
        Ok(config)
    }

    /// Set the base64 private JWK.
    #[must_use]
    pub fn with_private_key(mut self, key: impl Into<String>) -> Self {
        self.private_key = Some(key.into());
        self
    }

    /// Set the issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Set the base64 development public JWK.
    #[must_use]
    pub fn with_dev_public_key(mut self, key: impl Into<String>) -> Self {
        self.dev_public_key = Some(key.into());
        self
    }

    /// Set the development port.
    #[must_use]
    pub const fn with_dev_port(mut self, port: u16) -> Self {
        self.dev_port = Some(port);
        self
    }

    /// Set the remote JWKS cache lifetime.
    #[must_use]
    pub const fn with_jwks_cache_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_cache_ttl = ttl;
        self
    }

    /// Set the refetch cooldown for unknown key IDs.
    #[must_use]
    pub const fn with_jwks_cooldown(mut self, cooldown: Duration) -> Self {
        self.jwks_cooldown = cooldown;
        self
    }

    /// Set the remote JWKS request timeout.
    #[must_use]
    pub const fn with_jwks_timeout(mut self, timeout: Duration) -> Self {
        self.jwks_timeout = timeout;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dev_port == Some(0) {
            return Err(ConfigError::InvalidPort);
        }
        if self.jwks_cache_ttl.is_zero() {
            return Err(ConfigError::InvalidDuration {
                field: "jwks_cache_ttl".to_string(),
            });
        }
        if self.jwks_timeout.is_zero() {
            return Err(ConfigError::InvalidDuration {
                field: "jwks_timeout".to_string(),
            });
        }
        if let Some(issuer) = &self.issuer {
            issuer_url(issuer)?;
        }
        Ok(())
    }

    /// Issuer used for tokens in development mode.
    #[must_use]
    pub fn dev_issuer(&self) -> String {
        format!("http://localhost:{}", self.dev_port.unwrap_or(DEFAULT_DEV_PORT))
    }
}

/// Normalizes an issuer into a URL, defaulting to `https` when no scheme is given.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidUrl`] when the issuer is not a usable http(s) URL.
pub fn issuer_url(issuer: &str) -> Result<Url, ConfigError> {
    let candidate = if issuer.contains("://") {
        issuer.to_string()
    } else {
        format!("https://{issuer}")
    };

    let url = Url::parse(&candidate).map_err(|e| ConfigError::InvalidUrl {
        field: "issuer".to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl {
            field: "issuer".to_string(),
            reason: format!("unsupported issuer URL: {candidate}"),
        });
    }
    Ok(url)
}

/// Builds the JWKS document URL for an issuer.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidUrl`] when the issuer is not a valid URL.
pub fn jwks_url(issuer: &str) -> Result<Url, ConfigError> {
    let base = issuer_url(issuer)?;
    let joined = format!("{}/.well-known/jwks.json", base.as_str().trim_end_matches('/'));
    Url::parse(&joined).map_err(|e| ConfigError::InvalidUrl {
        field: "issuer".to_string(),
        reason: e.to_string(),
    })
}

/// Read an optional, non-empty environment variable.
fn optional_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable with a default value.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val.parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
