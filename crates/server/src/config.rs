//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PROVIDER_SECRET_KEY` - Key material for encrypting stored provider
//!   passwords (min 32 chars, high entropy)
//!
//! ## Optional
//! - `ELIZABETH_HOST` - Bind address (default: 127.0.0.1)
//! - `ELIZABETH_PORT` - Listen port (default: 8000)
//! - `DATABASE_URL` - `PostgreSQL` connection string; in-memory stores when unset
//! - `SEARCH_CACHE_TTL_MINUTES` - Freshness window for stored products (default: 60)
//! - `CHARACTERISTICS_MAX_ENTRIES` - Cap on pending characteristics records
//! - `CHARACTERISTICS_TTL_SECS` - Maximum age of characteristics records
//! - `EXTENSION_ALLOWED_ORIGIN` - CORS origin for callback endpoints (default: `*`)
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//!
//! ## Optional (Armtek)
//! - `ARMTEK_BASE_URL` - API base URL (default: <https://ws.armtek.ru>)
//! - `ARMTEK_TIMEOUT_SECS` - Request timeout (default: 10)
//! - `ARMTEK_ENABLE_STUB` - Serve synthesized results instead of calling Armtek
//! - `ARMTEK_STRICT_ROWS` - Reject incomplete search rows instead of skipping fields
//! - `ARMTEK_LOGIN` / `ARMTEK_PASSWORD` - Global default credentials (set together)
//! - `ARMTEK_VKORG`, `ARMTEK_KUNNR_RG`, `ARMTEK_PROGRAM`, `ARMTEK_KUNNR_ZA`,
//!   `ARMTEK_INCOTERMS`, `ARMTEK_VBELN` - Global default search context

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::armtek::{Credentials, PartialContext, RowParsing};

const MIN_SECRET_KEY_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_ARMTEK_BASE_URL: &str = "https://ws.armtek.ru";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
///
/// Implements `Debug` manually to redact secrets.
#[derive(Clone)]
pub struct ServerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// `PostgreSQL` connection URL; `None` selects the in-memory stores
    pub database_url: Option<SecretString>,
    /// Key material for the provider password cipher
    pub provider_secret_key: SecretString,
    /// Armtek integration settings
    pub armtek: ArmtekConfig,
    /// Stored products fetched within this window are not overwritten
    pub search_cache_ttl: Duration,
    /// Optional bounds for the characteristics store
    pub characteristics: CharacteristicsConfig,
    /// CORS origin allowed to call the characteristics endpoints
    pub extension_allowed_origin: String,
    /// Emit JSON logs
    pub json_logs: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("provider_secret_key", &"[REDACTED]")
            .field("armtek", &self.armtek)
            .field("search_cache_ttl", &self.search_cache_ttl)
            .field("characteristics", &self.characteristics)
            .field("extension_allowed_origin", &self.extension_allowed_origin)
            .field("json_logs", &self.json_logs)
            .field("sentry_dsn", &self.sentry_dsn)
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

/// Armtek integration settings.
///
/// Implements `Debug` manually to redact the default password.
#[derive(Clone)]
pub struct ArmtekConfig {
    /// API base URL
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Serve synthesized results instead of calling Armtek
    pub enable_stub: bool,
    /// Row parsing mode for search results
    pub row_parsing: RowParsing,
    /// Global default login and password (both or neither)
    pub default_login: Option<(String, SecretString)>,
    /// Global default search context
    pub default_context: PartialContext,
}

impl std::fmt::Debug for ArmtekConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmtekConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("enable_stub", &self.enable_stub)
            .field("row_parsing", &self.row_parsing)
            .field(
                "default_login",
                &self.default_login.as_ref().map(|(login, _)| (login, "[REDACTED]")),
            )
            .field("default_context", &self.default_context)
            .finish()
    }
}

impl Default for ArmtekConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ARMTEK_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            enable_stub: false,
            row_parsing: RowParsing::BestEffort,
            default_login: None,
            default_context: PartialContext::default(),
        }
    }
}

impl ArmtekConfig {
    /// Load Armtek settings from environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` for malformed numbers or when only
    /// one of `ARMTEK_LOGIN` / `ARMTEK_PASSWORD` is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs = get_env_or_default("ARMTEK_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("ARMTEK_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        let default_login = match (
            get_optional_env("ARMTEK_LOGIN"),
            get_optional_env("ARMTEK_PASSWORD"),
        ) {
            (Some(login), Some(password)) => Some((login, SecretString::from(password))),
            (None, None) => None,
            _ => {
                return Err(ConfigError::InvalidEnvVar(
                    "ARMTEK_*".to_string(),
                    "Both ARMTEK_LOGIN and ARMTEK_PASSWORD must be set together".to_string(),
                ));
            }
        };

        let incoterms = get_optional_env("ARMTEK_INCOTERMS")
            .map(|v| v.parse::<i32>())
            .transpose()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("ARMTEK_INCOTERMS".to_string(), e.to_string())
            })?;

        Ok(Self {
            base_url: get_env_or_default("ARMTEK_BASE_URL", DEFAULT_ARMTEK_BASE_URL),
            timeout: Duration::from_secs(timeout_secs),
            enable_stub: get_bool_env("ARMTEK_ENABLE_STUB"),
            row_parsing: if get_bool_env("ARMTEK_STRICT_ROWS") {
                RowParsing::Strict
            } else {
                RowParsing::BestEffort
            },
            default_login,
            default_context: PartialContext {
                vkorg: get_optional_env("ARMTEK_VKORG"),
                kunnr_rg: get_optional_env("ARMTEK_KUNNR_RG"),
                program: get_optional_env("ARMTEK_PROGRAM"),
                kunnr_za: get_optional_env("ARMTEK_KUNNR_ZA"),
                incoterms,
                vbeln: get_optional_env("ARMTEK_VBELN"),
            },
        })
    }

    /// Credentials built from the global defaults, if configured.
    #[must_use]
    pub fn default_credentials(&self) -> Option<Credentials> {
        let (login, password) = self.default_login.as_ref()?;
        Credentials::new(login, password.clone(), self.default_context.clone())
    }
}

/// Optional bounds for the in-memory characteristics store.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharacteristicsConfig {
    /// Evict oldest records beyond this count
    pub max_entries: Option<usize>,
    /// Evict records older than this
    pub max_age: Option<Duration>,
}

impl CharacteristicsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let max_entries = get_optional_env("CHARACTERISTICS_MAX_ENTRIES")
            .map(|v| v.parse::<usize>())
            .transpose()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CHARACTERISTICS_MAX_ENTRIES".to_string(), e.to_string())
            })?;
        let max_age = get_optional_env("CHARACTERISTICS_TTL_SECS")
            .map(|v| v.parse::<u64>().map(Duration::from_secs))
            .transpose()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CHARACTERISTICS_TTL_SECS".to_string(), e.to_string())
            })?;
        Ok(Self {
            max_entries,
            max_age,
        })
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("ELIZABETH_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("ELIZABETH_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("ELIZABETH_PORT", "8000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("ELIZABETH_PORT".to_string(), e.to_string()))?;
        let provider_secret_key = get_validated_secret("PROVIDER_SECRET_KEY")?;
        validate_secret_length(&provider_secret_key, "PROVIDER_SECRET_KEY")?;
        let cache_minutes = get_env_or_default("SEARCH_CACHE_TTL_MINUTES", "60")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SEARCH_CACHE_TTL_MINUTES".to_string(), e.to_string())
            })?;

        Ok(Self {
            host,
            port,
            database_url: get_optional_env("DATABASE_URL").map(SecretString::from),
            provider_secret_key,
            armtek: ArmtekConfig::from_env()?,
            search_cache_ttl: Duration::from_secs(cache_minutes * 60),
            characteristics: CharacteristicsConfig::from_env()?,
            extension_allowed_origin: get_env_or_default("EXTENSION_ALLOWED_ORIGIN", "*"),
            json_logs: get_optional_env("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Defaults for everything except the cipher key, as if no optional
    /// variable were set.
    #[must_use]
    pub fn with_secret_key(provider_secret_key: SecretString) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 8000,
            database_url: None,
            provider_secret_key,
            armtek: ArmtekConfig::default(),
            search_cache_ttl: Duration::from_secs(60 * 60),
            characteristics: CharacteristicsConfig::default(),
            extension_allowed_origin: "*".to_string(),
            json_logs: false,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Blank values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Interpret an environment variable as a boolean switch.
fn get_bool_env(key: &str) -> bool {
    get_optional_env(key).is_some_and(|v| {
        matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
    })
}

/// Validate that a secret key meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SECRET_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SECRET_KEY_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
