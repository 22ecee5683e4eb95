//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CREDENTIALS_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `CREDENTIALS_API_TOKENS` - Comma-separated `role:token` pairs, where role is
//!   `admin`, `issuer` or `viewer` (e.g. `admin:Zq8...,viewer:4Hk...`)
//!
//! ## Optional
//! - `CREDENTIALS_HOST` - Bind address (default: 127.0.0.1)
//! - `CREDENTIALS_PORT` - Listen port (default: 8150)
//! - `CREDENTIALS_PAGE_SIZE` - Default list page size (default: 20)
//! - `CREDENTIALS_MAX_PAGE_SIZE` - Largest page a client may request (default: 100)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use credentials_core::{Caller, CallerRole};

const MIN_TOKEN_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_PAGE_SIZE: u32 = 20;
const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

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

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Bearer tokens accepted by the API
    pub tokens: ApiTokens,
    /// List pagination limits
    pub pagination: PaginationConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Page size limits for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    /// Page size used when the client does not ask for one
    pub default_page_size: u32,
    /// Upper bound on client-requested page sizes
    pub max_page_size: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

impl PaginationConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let default_page_size = parse_page_size("CREDENTIALS_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        let max_page_size = parse_page_size("CREDENTIALS_MAX_PAGE_SIZE", DEFAULT_MAX_PAGE_SIZE)?;

        if default_page_size > max_page_size {
            return Err(ConfigError::InvalidEnvVar(
                "CREDENTIALS_PAGE_SIZE".to_string(),
                format!("must not exceed CREDENTIALS_MAX_PAGE_SIZE ({max_page_size})"),
            ));
        }

        Ok(Self {
            default_page_size,
            max_page_size,
        })
    }
}

/// Bearer tokens mapped to caller roles.
///
/// Each token gets a label of the form `<role>-<n>` (numbered per role in
/// listing order) so logs can name the caller without the secret.
/// Implements `Debug` manually to redact the tokens.
#[derive(Clone, Default)]
pub struct ApiTokens {
    entries: Vec<(CallerRole, SecretString)>,
}

impl std::fmt::Debug for ApiTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<String> = (0..self.entries.len()).map(|i| self.label(i)).collect();
        f.debug_struct("ApiTokens")
            .field("labels", &labels)
            .field("tokens", &"[REDACTED]")
            .finish()
    }
}

impl ApiTokens {
    /// Build a token table without strength checks.
    #[must_use]
    pub const fn new(entries: Vec<(CallerRole, SecretString)>) -> Self {
        Self { entries }
    }

    fn label(&self, index: usize) -> String {
        let Some((role, _)) = self.entries.get(index) else {
            return String::new();
        };
        let n = self
            .entries
            .iter()
            .take(index + 1)
            .filter(|(r, _)| r == role)
            .count();
        format!("{role}-{n}")
    }

    /// Parse a `role:token[,role:token...]` list, validating every token.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an entry is malformed, names an unknown role,
    /// repeats a token, or carries a weak token.
    pub fn parse(raw: &str, var_name: &str) -> Result<Self, ConfigError> {
        let mut entries: Vec<(CallerRole, SecretString)> = Vec::new();

        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (role, token) = entry.split_once(':').ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    var_name.to_string(),
                    "entries must look like role:token".to_string(),
                )
            })?;
            let role = role
                .trim()
                .parse::<CallerRole>()
                .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e))?;
            let token = token.trim();

            validate_token_length(token, var_name)?;
            validate_secret_strength(token, var_name)?;
            if entries.iter().any(|(_, t)| t.expose_secret() == token) {
                return Err(ConfigError::InvalidEnvVar(
                    var_name.to_string(),
                    "the same token is listed more than once".to_string(),
                ));
            }

            entries.push((role, SecretString::from(token)));
        }

        if entries.is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                var_name.to_string(),
                "at least one token is required".to_string(),
            ));
        }

        Ok(Self { entries })
    }

    /// The caller presenting `token`, if it is known.
    #[must_use]
    pub fn authenticate(&self, token: &str) -> Option<Caller> {
        let (index, (role, _)) = self
            .entries
            .iter()
            .enumerate()
            .find(|(_, (_, t))| t.expose_secret() == token)?;
        Some(Caller {
            role: *role,
            label: self.label(index),
        })
    }

    /// Number of configured tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no tokens are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if tokens fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("CREDENTIALS_DATABASE_URL")?;
        let host = get_env_or_default("CREDENTIALS_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CREDENTIALS_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("CREDENTIALS_PORT", "8150")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CREDENTIALS_PORT".to_string(), e.to_string())
            })?;
        let tokens = ApiTokens::parse(
            &get_required_env("CREDENTIALS_API_TOKENS")?,
            "CREDENTIALS_API_TOKENS",
        )?;
        let pagination = PaginationConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            tokens,
            pagination,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
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
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither variable is set.
pub fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
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
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a positive page size, falling back to `default` when unset.
fn parse_page_size(key: &str, default: u32) -> Result<u32, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    match raw.parse::<u32>() {
        Ok(0) => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        )),
        Ok(size) => Ok(size),
        Err(e) => Err(ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
    }
}

/// Validate that a token meets minimum length requirements.
fn validate_token_length(token: &str, var_name: &str) -> Result<(), ConfigError> {
    if token.len() < MIN_TOKEN_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "tokens must be at least {} characters (got {})",
                MIN_TOKEN_LENGTH,
                token.len()
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated token."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ADMIN_TOKEN: &str = "aB3xY9mK2nL5pQ7rT0uW4zC6dE8fG1hJ";
    const VIEWER_TOKEN: &str = "Zq8Hk4Lm7Np2Rs5Tv9Wx3Yb6Cd1Fg0Jk";

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-token-goes-right-here-now", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"a".repeat(40), "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_parse_tokens_maps_roles() {
        let raw = format!("admin:{ADMIN_TOKEN}, viewer:{VIEWER_TOKEN}");
        let tokens = ApiTokens::parse(&raw, "TEST_VAR").unwrap();

        assert_eq!(tokens.len(), 2);
        let admin = tokens.authenticate(ADMIN_TOKEN).unwrap();
        assert_eq!(admin.role, CallerRole::Admin);
        assert_eq!(admin.label, "admin-1");
        let viewer = tokens.authenticate(VIEWER_TOKEN).unwrap();
        assert_eq!(viewer.role, CallerRole::Viewer);
        assert!(tokens.authenticate("unknown").is_none());
    }

    #[test]
    fn test_parse_tokens_rejects_unknown_role() {
        let raw = format!("owner:{ADMIN_TOKEN}");
        let result = ApiTokens::parse(&raw, "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_parse_tokens_rejects_missing_separator() {
        let result = ApiTokens::parse(ADMIN_TOKEN, "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_parse_tokens_rejects_duplicates() {
        let raw = format!("admin:{ADMIN_TOKEN},viewer:{ADMIN_TOKEN}");
        let result = ApiTokens::parse(&raw, "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_parse_tokens_rejects_short_token() {
        let result = ApiTokens::parse("admin:aB3xY9mK2", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_parse_tokens_rejects_empty_list() {
        let result = ApiTokens::parse(" , ", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_api_tokens_debug_redacts_tokens() {
        let tokens = ApiTokens::new(vec![(CallerRole::Issuer, SecretString::from(ADMIN_TOKEN))]);
        let debug_output = format!("{tokens:?}");

        assert!(debug_output.contains("issuer-1"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(ADMIN_TOKEN));
    }

    #[test]
    fn test_socket_addr() {
        let config = ApiConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 8150,
            tokens: ApiTokens::default(),
            pagination: PaginationConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8150);
    }

    #[test]
    fn test_default_pagination() {
        let pagination = PaginationConfig::default();
        assert_eq!(pagination.default_page_size, 20);
        assert_eq!(pagination.max_page_size, 100);
    }
}
