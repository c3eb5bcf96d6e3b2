//! # Configuration
//!
//! Runtime settings read from the environment, optionally seeded from a
//! `.env` file. Every variable has a default; a value that is present but
//! unparseable is an `Error::Config` naming the variable.

use crate::database::DEFAULT_MAX_CONNECTIONS;
use crate::error::{Error, Result};
use crate::server::ServerConfig;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// Default `DATABASE_URL`
pub const DEFAULT_DATABASE_URL: &str = "sqlite:cinema.db?mode=rwc";

/// Where catalog records are kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    /// Process-local maps, lost on exit
    Memory,
    /// SQLite or PostgreSQL connection URL
    Sql(String),
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind host (`CINEMA_HOST`)
    pub host: IpAddr,
    /// Bind port (`CINEMA_PORT`)
    pub port: u16,
    /// Record storage (`DATABASE_URL`)
    pub storage: Storage,
    /// Pool size for SQL storage (`DATABASE_MAX_CONNECTIONS`)
    pub max_connections: u32,
    /// Request body limit in bytes (`CINEMA_MAX_BODY_SIZE`)
    pub max_body_size: usize,
    /// Graceful drain timeout (`CINEMA_SHUTDOWN_TIMEOUT_SECS`)
    pub shutdown_timeout: Duration,
    /// Origin for CORS headers, none when unset (`CINEMA_CORS_ORIGIN`)
    pub cors_origin: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let server = ServerConfig::default();
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: server.address.port(),
            storage: Storage::Sql(DEFAULT_DATABASE_URL.to_string()),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_body_size: server.max_body_size,
            shutdown_timeout: server.shutdown_timeout,
            cors_origin: None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// A `.env` file in the working directory is loaded first if present;
    /// variables already set in the environment win.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for the first invalid variable.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for the first invalid variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let storage = match var("DATABASE_URL") {
            Some(url) if url.trim().eq_ignore_ascii_case("memory") => Storage::Memory,
            Some(url) => Storage::Sql(url.trim().to_string()),
            None => defaults.storage,
        };

        let max_connections = parse(&var, "DATABASE_MAX_CONNECTIONS", defaults.max_connections)?;
        if max_connections == 0 {
            return Err(Error::Config {
                key: "DATABASE_MAX_CONNECTIONS",
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            host: parse(&var, "CINEMA_HOST", defaults.host)?,
            port: parse(&var, "CINEMA_PORT", defaults.port)?,
            storage,
            max_connections,
            max_body_size: parse(&var, "CINEMA_MAX_BODY_SIZE", defaults.max_body_size)?,
            shutdown_timeout: Duration::from_secs(parse(
                &var,
                "CINEMA_SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout.as_secs(),
            )?),
            cors_origin: var("CINEMA_CORS_ORIGIN").map(|v| v.trim().to_string()),
        })
    }

    /// Socket address the server binds to
    #[must_use]
    pub const fn address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// HTTP server settings derived from this configuration
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            address: self.address(),
            shutdown_timeout: self.shutdown_timeout,
            max_body_size: self.max_body_size,
            ..ServerConfig::default()
        }
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| Error::Config {
            key,
            message: format!("'{raw}': {e}"),
        }),
    }
}
