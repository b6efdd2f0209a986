use std::env;
use std::net::SocketAddr;

use chrono_tz::Tz;

use crate::utils::{AppError, AppResult};

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::security_header_layers;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/boxoffice";
const DEFAULT_BIND: &str = "0.0.0.0:3001";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_TIMEZONE: &str = "Asia/Tokyo";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub store: StoreKind,
    pub bind_addr: SocketAddr,
    /// Zone used for the "day before" reception deadline.
    pub timezone: Tz,
    pub is_production: bool,
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let store = match lookup("BOXOFFICE_STORE")
            .unwrap_or_else(|| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StoreKind::Postgres,
            "memory" => StoreKind::Memory,
            other => return Err(invalid("BOXOFFICE_STORE", other)),
        };

        let bind = lookup("BOXOFFICE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind
            .parse::<SocketAddr>()
            .map_err(|_| invalid("BOXOFFICE_BIND", &bind))?;

        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value
                .parse::<u32>()
                .map_err(|_| invalid("DATABASE_MAX_CONNECTIONS", &value))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let timezone_name =
            lookup("BOXOFFICE_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone = timezone_name
            .parse::<Tz>()
            .map_err(|_| invalid("BOXOFFICE_TIMEZONE", &timezone_name))?;

        let is_production = lookup("RUST_ENV")
            .map(|v| v.to_lowercase() == "production")
            .unwrap_or(false);

        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            database_max_connections,
            store,
            bind_addr,
            timezone,
            is_production,
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string()),
        })
    }
}

fn invalid(key: &str, value: &str) -> AppError {
    AppError::ValidationError(format!("invalid value '{}' for {}", value, key))
}
