use std::env;
use std::net::SocketAddr;

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Source of "today" for every cycle computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Clock {
    /// Current UTC calendar date.
    System,
    Fixed(NaiveDate),
}

impl Clock {
    pub fn today(&self) -> NaiveDate {
        match self {
            Clock::System => chrono::Utc::now().date_naive(),
            Clock::Fixed(date) => *date,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// When unset the in-memory store is used.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
    pub clock: Clock,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::Invalid { name: "DB_MAX_CONNECTIONS", value: raw }),
            },
            None => 5,
        };

        let bind_addr = match lookup("BIND_ADDR") {
            Some(raw) => raw
                .parse::<SocketAddr>()
                .map_err(|_| ConfigError::Invalid { name: "BIND_ADDR", value: raw })?,
            None => SocketAddr::from(([0, 0, 0, 0], 3050)),
        };

        let clock = match lookup("TRACKER_TODAY") {
            Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map(Clock::Fixed)
                .map_err(|_| ConfigError::Invalid { name: "TRACKER_TODAY", value: raw })?,
            None => Clock::System,
        };

        Ok(Self { database_url, max_connections, bind_addr, clock })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.bind_addr.port(), 3050);
        assert_eq!(config.clock, Clock::System);
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgres://bbt@localhost/bbt"),
            ("DB_MAX_CONNECTIONS", "2"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("TRACKER_TODAY", "2024-02-10"),
        ])
        .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("postgres://bbt@localhost/bbt"));
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.clock.today(), NaiveDate::from_ymd_opt(2024, 2, 10).unwrap());
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            load(&[("DB_MAX_CONNECTIONS", "0")]),
            Err(ConfigError::Invalid { name: "DB_MAX_CONNECTIONS", value: "0".into() })
        );
        assert!(load(&[("BIND_ADDR", "nowhere")]).is_err());
        assert!(load(&[("TRACKER_TODAY", "10/02/2024")]).is_err());
    }

    #[test]
    fn blank_database_url_means_memory() {
        assert_eq!(load(&[("DATABASE_URL", "  ")]).unwrap().database_url, None);
    }
}
