//! Billing service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BILLING_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `BILLING_BASE_URL` - Public URL for the service
//! - `BILLING_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `BILLING_HOST` - Bind address (default: 127.0.0.1)
//! - `BILLING_PORT` - Listen port (default: 3000)
//! - `BILLING_DEBUG` - Development mode, accepts any next-URL host (default: false)
//! - `BILLING_ALLOWED_HOSTS` - Comma-separated hosts allowed in next-URLs (`*` only in debug)
//! - `BILLING_BROKER_SLUG` - Slug of the organization hosting the platform (default: broker)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use ledgerline_core::Slug;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

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

/// Billing service configuration.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the service
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Development mode
    pub debug: bool,
    /// Hosts a next-URL may point at
    pub allowed_hosts: AllowedHosts,
    /// Slug of the organization operating the platform
    pub broker_slug: Slug,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Allow-list of hosts accepted in redirect targets.
///
/// Entries match a host exactly; an entry starting with `.` matches the
/// domain itself and any subdomain; `*` matches every host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedHosts(Vec<String>);

impl AllowedHosts {
    /// Build an allow-list from patterns. Patterns are lowercased.
    #[must_use]
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_ascii_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        )
    }

    /// Allow-list that accepts any host (development mode).
    #[must_use]
    pub fn any() -> Self {
        Self(vec!["*".to_owned()])
    }

    /// Parse a comma-separated list.
    #[must_use]
    pub fn from_csv(value: &str) -> Self {
        Self::new(value.split(','))
    }

    /// Returns `true` if a `*` pattern accepts every host.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.0.iter().any(|p| p == "*")
    }

    /// Returns `true` if `host` matches one of the patterns.
    #[must_use]
    pub fn allows(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return false;
        }
        self.0.iter().any(|pattern| {
            if pattern == "*" {
                return true;
            }
            if let Some(domain) = pattern.strip_prefix('.') {
                return host == domain || host.ends_with(pattern.as_str());
            }
            host == *pattern
        })
    }
}

impl BillingConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the session secret fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("BILLING_DATABASE_URL")?;
        let host = parse_env("BILLING_HOST", "127.0.0.1")?;
        let port = parse_env("BILLING_PORT", "3000")?;
        let base_url = get_required_env("BILLING_BASE_URL")?;
        let session_secret = get_validated_secret("BILLING_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "BILLING_SESSION_SECRET")?;

        let debug = parse_bool(&get_env_or_default("BILLING_DEBUG", "false"));
        let allowed_hosts = if debug {
            AllowedHosts::any()
        } else {
            get_optional_env("BILLING_ALLOWED_HOSTS")
                .map(|v| parse_allowed_hosts("BILLING_ALLOWED_HOSTS", &v))
                .transpose()?
                .unwrap_or_default()
        };
        let broker_slug = get_env_or_default("BILLING_BROKER_SLUG", "broker");
        let broker_slug = Slug::parse(&broker_slug).map_err(|e| {
            ConfigError::InvalidEnvVar("BILLING_BROKER_SLUG".to_string(), e.to_string())
        })?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            debug,
            allowed_hosts,
            broker_slug,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
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

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a production allow-list; `*` is only honored in development mode.
fn parse_allowed_hosts(key: &str, value: &str) -> Result<AllowedHosts, ConfigError> {
    let hosts = AllowedHosts::from_csv(value);
    if hosts.is_wildcard() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "`*` is only allowed with BILLING_DEBUG enabled".to_string(),
        ));
    }
    Ok(hosts)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
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
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_hosts_exact_match() {
        let hosts = AllowedHosts::from_csv("billing.acme.io, Localhost");
        assert!(hosts.allows("billing.acme.io"));
        assert!(hosts.allows("localhost"));
        assert!(hosts.allows("BILLING.ACME.IO."));
        assert!(!hosts.allows("evil.example"));
        assert!(!hosts.allows("acme.io"));
    }

    #[test]
    fn test_allowed_hosts_subdomain_pattern() {
        let hosts = AllowedHosts::new([".acme.io"]);
        assert!(hosts.allows("acme.io"));
        assert!(hosts.allows("eu.billing.acme.io"));
        assert!(!hosts.allows("notacme.io"));
    }

    #[test]
    fn test_allowed_hosts_wildcard_and_empty() {
        assert!(AllowedHosts::any().allows("anything.test"));
        assert!(!AllowedHosts::default().allows("localhost"));
        assert!(!AllowedHosts::any().allows(""));
    }

    #[test]
    fn test_wildcard_rejected_outside_debug() {
        assert!(matches!(
            parse_allowed_hosts("BILLING_ALLOWED_HOSTS", "billing.acme.io, *"),
            Err(ConfigError::InvalidEnvVar(key, _)) if key == "BILLING_ALLOWED_HOSTS"
        ));
        let hosts = parse_allowed_hosts("BILLING_ALLOWED_HOSTS", "billing.acme.io").unwrap();
        assert!(!hosts.is_wildcard());
        assert!(!hosts.allows("evil.example"));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" 1 "));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_validate_secret_strength() {
        assert!(validate_secret_strength("changeme123", "TEST_VAR").is_err());
        assert!(matches!(
            validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR"),
            Err(ConfigError::InsecureSecret(_, _))
        ));
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_session_secret_length() {
        assert!(validate_session_secret(&SecretString::from("short"), "TEST").is_err());
        assert!(validate_session_secret(&SecretString::from("a".repeat(32)), "TEST").is_ok());
    }
}
