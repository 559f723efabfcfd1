//! Environment configuration
//!
//! | Variable | Default |
//! |---|---|
//! | `PORT` | `5000` |
//! | `HOST` | `0.0.0.0` |
//! | `TODO_STORE` | `mongodb` when `MONGODB_URI` is set, else `memory` |
//! | `MONGODB_URI` | required for `mongodb` |
//! | `MONGODB_DATABASE` | `todo_app` |
//! | `MONGODB_COLLECTION` | `todos` |
//! | `WORKERS` | number of CPUs |
//! | `MAX_BODY_SIZE` | `1mb` |
//! | `SHUTDOWN_TIMEOUT_SECS` | `10` |

use crate::{Error, Result};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_DATABASE: &str = "todo_app";
pub const DEFAULT_COLLECTION: &str = "todos";

/// Server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub hostname: String,
    pub workers: usize,
    /// Largest accepted request body in bytes
    pub max_body_size: usize,
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            hostname: "0.0.0.0".to_string(),
            workers: num_cpus::get(),
            max_body_size: 1024 * 1024,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Address to bind
    pub fn addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .hostname
            .parse()
            .map_err(|_| Error::Config(format!("HOST is not an IP address: {}", self.hostname)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// MongoDB connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

/// Which store backs the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Memory,
    MongoDb(MongoConfig),
}

/// Process configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
}

impl Config {
    /// Read from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary variable lookup
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = ServerConfig::default();

        let port = match get("PORT") {
            Some(v) => v
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("PORT is not a valid port: {}", v)))?,
            None => defaults.port,
        };

        let workers = match get("WORKERS") {
            Some(v) => match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(Error::Config(format!("WORKERS must be a positive integer: {}", v))),
            },
            None => defaults.workers,
        };

        let max_body_size = match get("MAX_BODY_SIZE") {
            Some(v) => parse_size(&v)
                .ok_or_else(|| Error::Config(format!("MAX_BODY_SIZE is not a size: {}", v)))?,
            None => defaults.max_body_size,
        };

        let shutdown_timeout = match get("SHUTDOWN_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| Error::Config(format!("SHUTDOWN_TIMEOUT_SECS is not a number: {}", v)))?,
            None => defaults.shutdown_timeout,
        };

        let server = ServerConfig {
            port,
            hostname: get("HOST").unwrap_or(defaults.hostname),
            workers,
            max_body_size,
            shutdown_timeout,
        };
        server.addr()?;

        let uri = get("MONGODB_URI");
        let kind = get("TODO_STORE").map(|v| v.trim().to_lowercase());
        let store = match (kind.as_deref(), uri) {
            (Some("memory"), _) | (None, None) => StoreConfig::Memory,
            (Some("mongodb") | Some("mongo") | None, Some(uri)) => StoreConfig::MongoDb(MongoConfig {
                uri,
                database: get("MONGODB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
                collection: get("MONGODB_COLLECTION")
                    .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            }),
            (Some("mongodb") | Some("mongo"), None) => {
                return Err(Error::Config(
                    "MONGODB_URI is required when TODO_STORE=mongodb".to_string(),
                ))
            }
            (Some(other), _) => {
                return Err(Error::Config(format!(
                    "TODO_STORE must be `memory` or `mongodb`, got `{}`",
                    other
                )))
            }
        };

        Ok(Self { server, store })
    }
}

/// Parse a size such as `"10mb"`, `"500kb"`, `"1gb"` or `"100"` (bytes)
pub fn parse_size(s: &str) -> Option<usize> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix("gb") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("mb") {
        (n, 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("kb") {
        (n, 1024)
    } else if let Some(n) = s.strip_suffix('b') {
        (n, 1)
    } else {
        (s.as_str(), 1)
    };

    let num: usize = num_str.trim().parse().ok()?;
    num.checked_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.hostname, "0.0.0.0");
        assert_eq!(config.server.max_body_size, 1024 * 1024);
        assert!(config.server.workers >= 1);
        assert_eq!(config.store, StoreConfig::Memory);
    }

    #[test]
    fn test_mongo_selected_by_uri() {
        let config = config(&[("MONGODB_URI", "mongodb://db:27017"), ("PORT", "8080")]).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.store,
            StoreConfig::MongoDb(MongoConfig {
                uri: "mongodb://db:27017".to_string(),
                database: DEFAULT_DATABASE.to_string(),
                collection: DEFAULT_COLLECTION.to_string(),
            })
        );
    }

    #[test]
    fn test_explicit_memory_wins_over_uri() {
        let config = config(&[("TODO_STORE", "memory"), ("MONGODB_URI", "mongodb://db")]).unwrap();
        assert_eq!(config.store, StoreConfig::Memory);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config(&[("PORT", "http")]), Err(Error::Config(_))));
        assert!(matches!(config(&[("PORT", "70000")]), Err(Error::Config(_))));
        assert!(matches!(config(&[("WORKERS", "0")]), Err(Error::Config(_))));
        assert!(matches!(config(&[("HOST", "localhost")]), Err(Error::Config(_))));
        assert!(matches!(config(&[("TODO_STORE", "redis")]), Err(Error::Config(_))));
        assert!(matches!(config(&[("TODO_STORE", "mongodb")]), Err(Error::Config(_))));
        assert!(matches!(config(&[("MAX_BODY_SIZE", "lots")]), Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_value_is_unset() {
        let config = config(&[("PORT", ""), ("MONGODB_URI", "  ")]).unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.store, StoreConfig::Memory);
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("10mb"), Some(10 * 1024 * 1024));
        assert_eq!(parse_size("500KB"), Some(500 * 1024));
        assert_eq!(parse_size("1gb"), Some(1024 * 1024 * 1024));
        assert_eq!(parse_size("100b"), Some(100));
        assert_eq!(parse_size("100"), Some(100));
        assert_eq!(parse_size("mb"), None);
    }
}
