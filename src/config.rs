use std::net::SocketAddr;

use anyhow::Context;

pub const DEFAULT_BIND: &str = "127.0.0.1:7870";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_LOG_FILTER: &str = "prevention_analytics=info";

/// Runtime settings read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub bind: SocketAddr,
    pub log_filter: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_connections = match lookup("PREVENTION_MAX_CONNECTIONS") {
            Some(raw) => raw.trim().parse().with_context(|| {
                format!("PREVENTION_MAX_CONNECTIONS must be a number, got '{raw}'")
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        let bind_raw = lookup("PREVENTION_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .trim()
            .parse()
            .with_context(|| format!("PREVENTION_BIND must be host:port, got '{bind_raw}'"))?;

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            max_connections,
            bind,
            log_filter: lookup("PREVENTION_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to the field-quality Postgres instance")
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
    fn defaults_apply_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).expect("defaults");
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert!(config.require_database_url().is_err());
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/quality"),
            ("PREVENTION_MAX_CONNECTIONS", "12"),
            ("PREVENTION_BIND", "0.0.0.0:9000"),
        ]))
        .expect("overrides");
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(
            config.require_database_url().expect("url"),
            "postgres://localhost/quality"
        );
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(AppConfig::from_lookup(lookup(&[("PREVENTION_MAX_CONNECTIONS", "many")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("PREVENTION_BIND", "localhost")])).is_err());
    }
}
