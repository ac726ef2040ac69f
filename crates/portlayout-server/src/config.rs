//! Server configuration read from the environment.
//!
//! - `PORTLAYOUT_DB_PATH`: SQLite database file (default `portlayout.db`,
//!   `:memory:` for a throwaway in-memory database)
//! - `PORTLAYOUT_BIND`: listen address (default `0.0.0.0`)
//! - `PORTLAYOUT_PORT`: listen port (default `3000`)

use tracing::warn;

/// Value of `PORTLAYOUT_DB_PATH` that selects an in-memory database.
pub const IN_MEMORY_DB: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub db_path: String,
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            db_path: "portlayout.db".to_string(),
            bind: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup. Unset or blank
    /// variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = ServerConfig::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("PORTLAYOUT_DB_PATH") {
            config.db_path = v;
        }
        if let Some(v) = get("PORTLAYOUT_BIND") {
            config.bind = v;
        }
        if let Some(v) = get("PORTLAYOUT_PORT") {
            match v.trim().parse::<u16>() {
                Ok(port) => config.port = port,
                Err(_) => warn!(
                    value = %v,
                    default = config.port,
                    "ignoring invalid PORTLAYOUT_PORT"
                ),
            }
        }
        config
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path == IN_MEMORY_DB
    }

    /// `bind:port`, ready for `TcpListener::bind`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = config(&[]);
        assert_eq!(cfg, ServerConfig::default());
        assert_eq!(cfg.addr(), "0.0.0.0:3000");
        assert!(!cfg.is_in_memory());
    }

    #[test]
    fn overrides_from_variables() {
        let cfg = config(&[
            ("PORTLAYOUT_DB_PATH", ":memory:"),
            ("PORTLAYOUT_BIND", "127.0.0.1"),
            ("PORTLAYOUT_PORT", "8081"),
        ]);
        assert!(cfg.is_in_memory());
        assert_eq!(cfg.addr(), "127.0.0.1:8081");
    }

    #[test]
    fn bad_port_falls_back() {
        let cfg = config(&[("PORTLAYOUT_PORT", "eighty")]);
        assert_eq!(cfg.port, 3000);
        let cfg = config(&[("PORTLAYOUT_PORT", "70000")]);
        assert_eq!(cfg.port, 3000);
    }
}
