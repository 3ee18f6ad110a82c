// src/config.rs

use std::{env, net::SocketAddr};

use dotenvy::dotenv;
use thiserror::Error;

/// Default token lifetime: one day.
const DEFAULT_JWT_EXPIRATION: u64 = 86_400;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub cors_origins: Vec<String>,
    /// Seeded at boot when both are present.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

/// Raised when the environment cannot produce a usable `Config`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let jwt_expiration = match env::var("JWT_EXPIRATION") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                key: "JWT_EXPIRATION",
                value: raw,
            })?,
            Err(_) => DEFAULT_JWT_EXPIRATION,
        };

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = match env::var("BIND_ADDR") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                key: "BIND_ADDR",
                value: raw,
            })?,
            Err(_) => SocketAddr::from(([0, 0, 0, 0], 3000)),
        };

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]
            });

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            cors_origins,
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}
