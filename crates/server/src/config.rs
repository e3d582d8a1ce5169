//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `BAZAAR_BASE_URL` - Public URL of the API (`https://` enables secure cookies)
//! - `SESSION_SECRET` - Session secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `BAZAAR_HOST` - Bind address (default: 127.0.0.1)
//! - `BAZAAR_PORT` - Listen port (default: 3000)
//! - `TAX_RATE` - Checkout tax rate (default: 0.10)
//! - `FREE_SHIPPING_THRESHOLD` - Subtotal above which shipping is free (default: 100.00)
//! - `FLAT_SHIPPING_FEE` - Shipping fee below the threshold (default: 10.00)
//! - `LOW_STOCK_THRESHOLD` - Low stock listing threshold (default: 10)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_FROM` - all or none
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//! - `LOG_FORMAT` - `json` for structured logs (default: text)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rust_decimal::Decimal;
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

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// Session secret
    pub session_secret: SecretString,
    /// Checkout pricing rules
    pub checkout: CheckoutConfig,
    /// Products at or below this stock count are listed as low stock
    pub low_stock_threshold: i32,
    /// SMTP settings; `None` disables email
    pub email: Option<EmailConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry performance traces sample rate
    pub sentry_traces_sample_rate: f32,
    /// Emit JSON logs instead of text
    pub json_logs: bool,
}

/// Pricing constants applied at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutConfig {
    /// Fraction of the discounted subtotal charged as tax
    pub tax_rate: Decimal,
    /// Shipping is free when the subtotal exceeds this amount
    pub free_shipping_threshold: Decimal,
    /// Shipping fee otherwise
    pub flat_shipping_fee: Decimal,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(10, 2),
            free_shipping_threshold: Decimal::new(100, 0),
            flat_shipping_fee: Decimal::new(10, 0),
        }
    }
}

/// SMTP configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = SecretString::from(get_required_env("DATABASE_URL")?);
        let host = parse_env_or_default::<IpAddr>("BAZAAR_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("BAZAAR_PORT", "3000")?;
        let base_url = get_required_env("BAZAAR_BASE_URL")?;
        let session_secret = get_validated_secret("SESSION_SECRET")?;
        validate_session_secret(&session_secret, "SESSION_SECRET")?;

        let checkout = CheckoutConfig::from_env()?;
        let low_stock_threshold = parse_env_or_default::<i32>("LOW_STOCK_THRESHOLD", "10")?;
        let email = EmailConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            checkout,
            low_stock_threshold,
            email,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env_or_default::<f32>("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env_or_default::<f32>(
                "SENTRY_TRACES_SAMPLE_RATE",
                "0.1",
            )?,
            json_logs: get_env_or_default("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the public URL is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl CheckoutConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let tax_rate = parse_env_or::<Decimal>("TAX_RATE", defaults.tax_rate)?;
        if tax_rate.is_sign_negative() || tax_rate >= Decimal::ONE {
            return Err(ConfigError::InvalidEnvVar(
                "TAX_RATE".to_owned(),
                "must be in [0, 1)".to_owned(),
            ));
        }
        let free_shipping_threshold =
            parse_env_or::<Decimal>("FREE_SHIPPING_THRESHOLD", defaults.free_shipping_threshold)?;
        let flat_shipping_fee =
            parse_env_or::<Decimal>("FLAT_SHIPPING_FEE", defaults.flat_shipping_fee)?;
        if free_shipping_threshold.is_sign_negative() || flat_shipping_fee.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                "FLAT_SHIPPING_FEE".to_owned(),
                "shipping amounts cannot be negative".to_owned(),
            ));
        }

        Ok(Self {
            tax_rate,
            free_shipping_threshold,
            flat_shipping_fee,
        })
    }
}

impl EmailConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env_or_default::<u16>("SMTP_PORT", "587")?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: SecretString::from(get_required_env("SMTP_PASSWORD")?),
            from_address: get_required_env("SMTP_FROM")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to a textual default.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse an optional environment variable, falling back to a typed default.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
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
    fn test_shannon_entropy_bounds() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("zzzzzz") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("Qm7#vR2!kP9@wL4$") > MIN_ENTROPY_BITS_PER_CHAR);
    }

    #[test]
    fn test_validate_secret_strength_rejects_placeholders() {
        let err = validate_secret_strength("changeme-please-0123456789", "SESSION_SECRET")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
        assert!(validate_secret_strength("your-session-key", "SESSION_SECRET").is_err());
    }

    #[test]
    fn test_validate_secret_strength_rejects_low_entropy() {
        assert!(validate_secret_strength(&"ab".repeat(20), "SESSION_SECRET").is_err());
    }

    #[test]
    fn test_validate_secret_strength_accepts_random() {
        assert!(validate_secret_strength("Qm7#vR2!kP9@wL4$zT8^nB1&cX5*hJ6", "SESSION_SECRET").is_ok());
    }

    #[test]
    fn test_validate_session_secret_length() {
        let short = SecretString::from("tooShort1!");
        assert!(validate_session_secret(&short, "SESSION_SECRET").is_err());
        let long = SecretString::from("k".repeat(MIN_SESSION_SECRET_LENGTH));
        assert!(validate_session_secret(&long, "SESSION_SECRET").is_ok());
    }

    #[test]
    fn test_checkout_defaults() {
        let defaults = CheckoutConfig::default();
        assert_eq!(defaults.tax_rate, Decimal::new(10, 2));
        assert_eq!(defaults.free_shipping_threshold, Decimal::from(100));
        assert_eq!(defaults.flat_shipping_fee, Decimal::from(10));
    }

    #[test]
    fn test_email_config_debug_redacts_password() {
        let config = EmailConfig {
            smtp_host: "smtp.mailhost.test".to_owned(),
            smtp_port: 587,
            smtp_username: "mailer".to_owned(),
            smtp_password: SecretString::from("hunter2-very-private"),
            from_address: "Bazaar <orders@bazaar.test>".to_owned(),
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }
}
