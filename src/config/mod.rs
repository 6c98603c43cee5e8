use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/resale";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_EMAIL_DOMAIN: &str = "uky.edu";
const DEFAULT_VAPID_SUBJECT: &str = "mailto:support@localhost";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    pub jwt_secret: String,
    pub allowed_email_domain: String,
    /// PEM file holding the VAPID private key. Push is disabled without it.
    pub vapid_private_key_path: Option<PathBuf>,
    pub vapid_subject: String,
    pub cors_allowed_origins: Option<String>,
    pub production: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let bind_addr = non_empty("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let max_connections = match non_empty("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.parse::<u32>().map_err(|e| ConfigError::Invalid {
                name: "DATABASE_MAX_CONNECTIONS",
                reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let jwt_secret = non_empty("AUTH_JWT_SECRET").ok_or(ConfigError::Missing("AUTH_JWT_SECRET"))?;

        let allowed_email_domain = non_empty("AUTH_ALLOWED_EMAIL_DOMAIN")
            .unwrap_or_else(|| DEFAULT_EMAIL_DOMAIN.to_string())
            .trim_start_matches('@')
            .to_lowercase();

        Ok(Self {
            database_url: non_empty("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            bind_addr,
            max_connections,
            jwt_secret,
            allowed_email_domain,
            vapid_private_key_path: non_empty("VAPID_PRIVATE_KEY_PATH").map(PathBuf::from),
            vapid_subject: non_empty("VAPID_SUBJECT").unwrap_or_else(|| DEFAULT_VAPID_SUBJECT.to_string()),
            cors_allowed_origins: non_empty("CORS_ALLOWED_ORIGINS"),
            production: non_empty("RUST_ENV")
                .map(|v| v.to_lowercase() == "production")
                .unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("AUTH_JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.bind_addr.port(), 3001);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.allowed_email_domain, "uky.edu");
        assert!(config.vapid_private_key_path.is_none());
        assert!(!config.production);
    }

    #[test]
    fn test_jwt_secret_is_required() {
        assert_eq!(
            Config::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::Missing("AUTH_JWT_SECRET")
        );
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = Config::from_lookup(lookup(&[
            ("AUTH_JWT_SECRET", "s3cret"),
            ("DATABASE_MAX_CONNECTIONS", "many"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "DATABASE_MAX_CONNECTIONS",
                ..
            }
        ));
    }

    #[test]
    fn test_domain_and_production_flags() {
        let config = Config::from_lookup(lookup(&[
            ("AUTH_JWT_SECRET", "s3cret"),
            ("AUTH_ALLOWED_EMAIL_DOMAIN", "@UKY.EDU"),
            ("RUST_ENV", "Production"),
        ]))
        .unwrap();
        assert_eq!(config.allowed_email_domain, "uky.edu");
        assert!(config.production);
    }
}
