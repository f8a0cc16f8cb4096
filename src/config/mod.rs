//! Configuration management
//!
//! This module handles loading and validating configuration from environment variables,
//! with support for different environments (development, staging, production).

use std::env;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::Duration;
use thiserror::Error;

/// Minimum JWT secret length accepted in production
const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Upper bound for every duration setting (10 years)
const MAX_DURATION_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }
}

impl Environment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Get the environment name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Current environment
    pub environment: Environment,

    /// Listen address
    pub host: IpAddr,

    /// Server port
    pub port: u16,

    /// Ethereum JSON-RPC endpoint used by the balance/chain proxy
    pub rpc_url: String,

    /// Expected chain ID in SIWE messages (0 accepts any chain)
    pub chain_id: u64,

    /// Expected SIWE domain
    pub siwe_domain: String,

    /// Expected SIWE URI
    pub siwe_uri: String,

    /// Statement suggested to clients building a SIWE message
    pub siwe_statement: String,

    /// Nonce TTL in seconds (default: 300 = 5 minutes)
    pub siwe_nonce_ttl_seconds: i64,

    /// Allowed clock skew in seconds (default: 120)
    pub siwe_time_skew_seconds: i64,

    /// Interval between expired-nonce sweeps in seconds (0 disables the sweep)
    pub nonce_sweep_interval_seconds: u64,

    /// JWT secret for token signing
    pub jwt_secret: String,

    /// Token TTL in seconds (default: 86400 = 24 hours)
    pub jwt_expiry_seconds: i64,

    /// Issuer claim written to and expected in tokens
    pub jwt_issuer: String,

    /// CORS allowed origins
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required =
            |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let environment = var_or("ENVIRONMENT", "development").parse::<Environment>()?;

        let host = var_or("HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidValue("HOST must be an IP address".to_string()))?;

        let port = var_or("PORT", "8080")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let rpc_url = required("RPC_URL")?;

        let chain_id = parse_number("CHAIN_ID", &var_or("CHAIN_ID", "11155111"))?;

        let siwe_domain = required("SIWE_DOMAIN")?;
        let siwe_uri = var_or("SIWE_URI", "http://localhost:8080");
        let siwe_statement = var_or("SIWE_STATEMENT", "Sign in with Ethereum");

        let siwe_nonce_ttl_seconds = parse_seconds(
            "SIWE_NONCE_TTL_SECONDS",
            &var_or("SIWE_NONCE_TTL_SECONDS", "300"),
            1,
        )?;

        let siwe_time_skew_seconds = parse_seconds(
            "SIWE_TIME_SKEW_SECONDS",
            &var_or("SIWE_TIME_SKEW_SECONDS", "120"),
            0,
        )?;

        let nonce_sweep_interval_seconds = parse_seconds(
            "NONCE_SWEEP_INTERVAL_SECONDS",
            &var_or("NONCE_SWEEP_INTERVAL_SECONDS", "60"),
            0,
        )? as u64;

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.is_empty() {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET must not be empty".to_string(),
            ));
        }
        if environment.is_production() && jwt_secret.len() < MIN_PRODUCTION_SECRET_LEN {
            return Err(ConfigError::InvalidValue(format!(
                "JWT_SECRET must be at least {} bytes in production",
                MIN_PRODUCTION_SECRET_LEN
            )));
        }

        let jwt_expiry_seconds = parse_seconds(
            "JWT_EXPIRY_SECONDS",
            &var_or("JWT_EXPIRY_SECONDS", "86400"),
            1,
        )?;

        let jwt_issuer = var_or("JWT_ISSUER", "siwe-auth-server");

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS").filter(|s| !s.is_empty());

        let log_level = var_or("RUST_LOG", "info");

        Ok(Config {
            environment,
            host,
            port,
            rpc_url,
            chain_id,
            siwe_domain,
            siwe_uri,
            siwe_statement,
            siwe_nonce_ttl_seconds,
            siwe_time_skew_seconds,
            nonce_sweep_interval_seconds,
            jwt_secret,
            jwt_expiry_seconds,
            jwt_issuer,
            cors_allowed_origins,
            log_level,
        })
    }

    pub fn nonce_ttl(&self) -> Duration {
        Duration::seconds(self.siwe_nonce_ttl_seconds)
    }

    pub fn time_skew(&self) -> Duration {
        Duration::seconds(self.siwe_time_skew_seconds)
    }

    pub fn jwt_expiry(&self) -> Duration {
        Duration::seconds(self.jwt_expiry_seconds)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} must be a number, got '{}'", key, value)))
}

/// Parse a duration in seconds within `[min, MAX_DURATION_SECONDS]`
fn parse_seconds(key: &str, value: &str, min: i64) -> Result<i64, ConfigError> {
    let seconds: i64 = parse_number(key, value)?;
    if !(min..=MAX_DURATION_SECONDS).contains(&seconds) {
        return Err(ConfigError::InvalidValue(format!(
            "{} must be between {} and {} seconds, got {}",
            key, min, MAX_DURATION_SECONDS, seconds
        )));
    }
    Ok(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("RPC_URL", "https://rpc.sepolia.example"),
            ("SIWE_DOMAIN", "localhost:8080"),
            ("JWT_SECRET", "test-secret"),
        ]
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!(
            "dev".parse::<Environment>().unwrap(),
            Environment::Development
        );
        assert_eq!(
            "staging".parse::<Environment>().unwrap(),
            Environment::Staging
        );
        assert_eq!(
            "PROD".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert!("invalid".parse::<Environment>().is_err());
    }

    #[test]
    fn test_environment_is_production() {
        assert!(!Environment::Development.is_production());
        assert!(!Environment::Staging.is_production());
        assert!(Environment::Production.is_production());
        assert_eq!(Environment::Production.as_str(), "production");
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&minimal())).unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.port, 8080);
        assert_eq!(config.chain_id, 11155111);
        assert_eq!(config.siwe_uri, "http://localhost:8080");
        assert_eq!(config.nonce_ttl(), Duration::minutes(5));
        assert_eq!(config.time_skew(), Duration::minutes(2));
        assert_eq!(config.jwt_expiry(), Duration::hours(24));
        assert_eq!(config.jwt_issuer, "siwe-auth-server");
        assert_eq!(config.nonce_sweep_interval_seconds, 60);
        assert!(config.cors_allowed_origins.is_none());
    }

    #[test]
    fn test_missing_required() {
        for key in ["RPC_URL", "SIWE_DOMAIN", "JWT_SECRET"] {
            let pairs: Vec<_> = minimal().into_iter().filter(|(k, _)| *k != key).collect();
            let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
            assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == key));
        }
    }

    #[test]
    fn test_invalid_numbers() {
        let mut pairs = minimal();
        pairs.push(("CHAIN_ID", "mainnet"));
        assert!(matches!(
            Config::from_lookup(lookup_from(&pairs)),
            Err(ConfigError::InvalidValue(_))
        ));

        let mut pairs = minimal();
        pairs.push(("PORT", "99999"));
        assert!(matches!(
            Config::from_lookup(lookup_from(&pairs)),
            Err(ConfigError::InvalidPort(_))
        ));

        let mut pairs = minimal();
        pairs.push(("SIWE_NONCE_TTL_SECONDS", "0"));
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn test_duration_settings_are_bounded() {
        for (key, value) in [
            ("SIWE_NONCE_TTL_SECONDS", "-5"),
            ("SIWE_NONCE_TTL_SECONDS", "99999999999999999"),
            ("SIWE_TIME_SKEW_SECONDS", "-600"),
            ("SIWE_TIME_SKEW_SECONDS", "99999999999999999"),
            ("JWT_EXPIRY_SECONDS", "0"),
            ("JWT_EXPIRY_SECONDS", "9000000000000"),
            ("NONCE_SWEEP_INTERVAL_SECONDS", "-1"),
            ("NONCE_SWEEP_INTERVAL_SECONDS", "9000000000000"),
        ] {
            let mut pairs = minimal();
            pairs.push((key, value));
            assert!(
                matches!(
                    Config::from_lookup(lookup_from(&pairs)),
                    Err(ConfigError::InvalidValue(_))
                ),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }

    #[test]
    fn test_duration_settings_at_bounds() {
        let ten_years = MAX_DURATION_SECONDS.to_string();
        let mut pairs: Vec<(&str, &str)> = minimal();
        pairs.push(("SIWE_TIME_SKEW_SECONDS", "0"));
        pairs.push(("NONCE_SWEEP_INTERVAL_SECONDS", "0"));
        pairs.push(("JWT_EXPIRY_SECONDS", &ten_years));
        pairs.push(("SIWE_NONCE_TTL_SECONDS", &ten_years));

        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.time_skew(), Duration::zero());
        assert_eq!(config.nonce_sweep_interval_seconds, 0);
        assert_eq!(config.jwt_expiry(), Duration::days(10 * 365));
        assert_eq!(config.nonce_ttl(), Duration::days(10 * 365));
    }

    #[test]
    fn test_chain_id_zero_is_allowed() {
        let mut pairs = minimal();
        pairs.push(("CHAIN_ID", "0"));
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.chain_id, 0);
    }

    #[test]
    fn test_production_requires_long_secret() {
        let mut pairs = minimal();
        pairs.push(("ENVIRONMENT", "production"));
        assert!(matches!(
            Config::from_lookup(lookup_from(&pairs)),
            Err(ConfigError::InvalidValue(_))
        ));

        let pairs = vec![
            ("RPC_URL", "https://rpc.sepolia.example"),
            ("SIWE_DOMAIN", "app.example.com"),
            ("JWT_SECRET", "0123456789abcdef0123456789abcdef"),
            ("ENVIRONMENT", "production"),
        ];
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert!(config.environment.is_production());
    }
}
