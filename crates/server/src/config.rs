//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHARERIDES_BASE_URL` - Public URL of the site (used in magic links)
//! - `SHARERIDES_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`; only required with the `postgres` store)
//!
//! ## Optional
//! - `SHARERIDES_STORE` - `postgres` (default) or `memory`
//! - `SHARERIDES_HOST` - Bind address (default: 127.0.0.1)
//! - `SHARERIDES_PORT` - Listen port (default: 3000)
//! - `SHARERIDES_MAIL_TRANSPORT` - `log` (default) or `smtp`
//! - `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD` - Required with `smtp`
//! - `SMTP_PORT` - SMTP port (default: 587)
//! - `EMAIL_FROM` - Sender address (default: `ShareRideStories <noreply@shareridestories.com>`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

const DEFAULT_EMAIL_FROM: &str = "ShareRideStories <noreply@shareridestories.com>";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "put-your",
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

/// Which story/identity backend the server runs against.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// `PostgreSQL` via sqlx. Holds the connection URL.
    Postgres(SecretString),
    /// Process-local maps. Data is lost on restart.
    Memory,
}

/// How outbound email is delivered.
#[derive(Debug, Clone)]
pub enum MailTransport {
    /// Log the message (and magic link) instead of sending it.
    Log,
    /// Deliver over SMTP with STARTTLS.
    Smtp(SmtpConfig),
}

/// SMTP relay settings.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Outbound email configuration.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Sender, as an RFC 5322 mailbox (`Name <addr>` or bare address).
    pub from_address: String,
    pub transport: MailTransport,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub store: StoreBackend,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, without trailing slash
    pub base_url: String,
    pub email: EmailConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the SMTP password looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let store = match get_env_or_default("SHARERIDES_STORE", "postgres").as_str() {
            "postgres" => StoreBackend::Postgres(get_database_url("SHARERIDES_DATABASE_URL")?),
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "SHARERIDES_STORE".to_owned(),
                    format!("expected 'postgres' or 'memory', got '{other}'"),
                ));
            }
        };

        let host = parse_env("SHARERIDES_HOST", "127.0.0.1")?;
        let port = parse_env("SHARERIDES_PORT", "3000")?;
        let base_url = normalize_base_url(&get_required_env("SHARERIDES_BASE_URL")?)?;
        let email = EmailConfig::from_env()?;

        Ok(Self {
            store,
            host,
            port,
            base_url,
            email,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration for an in-memory server with logged email.
    ///
    /// Used by tests and local experiments; nothing is read from the
    /// environment.
    #[must_use]
    pub fn in_memory(base_url: impl Into<String>) -> Self {
        Self {
            store: StoreBackend::Memory,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            email: EmailConfig {
                from_address: DEFAULT_EMAIL_FROM.to_owned(),
                transport: MailTransport::Log,
            },
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl EmailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let from_address = get_env_or_default("EMAIL_FROM", DEFAULT_EMAIL_FROM);
        let transport = match get_env_or_default("SHARERIDES_MAIL_TRANSPORT", "log").as_str() {
            "log" => MailTransport::Log,
            "smtp" => MailTransport::Smtp(SmtpConfig {
                host: get_required_env("SMTP_HOST")?,
                port: parse_env("SMTP_PORT", "587")?,
                username: get_required_env("SMTP_USERNAME")?,
                password: get_validated_secret("SMTP_PASSWORD")?,
            }),
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "SHARERIDES_MAIL_TRANSPORT".to_owned(),
                    format!("expected 'log' or 'smtp', got '{other}'"),
                ));
            }
        };

        Ok(Self {
            from_address,
            transport,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate the base URL and strip any trailing slash.
fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let url = url::Url::parse(raw).map_err(|e| {
        ConfigError::InvalidEnvVar("SHARERIDES_BASE_URL".to_owned(), e.to_string())
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            "SHARERIDES_BASE_URL".to_owned(),
            "must be an absolute http(s) URL".to_owned(),
        ));
    }
    Ok(raw.trim_end_matches('/').to_owned())
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
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
