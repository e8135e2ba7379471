use std::net::SocketAddr;

use anyhow::Context;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:consult.db?mode=rwc";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_LOG_FILTER: &str = "info,sqlx=warn";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Staff identities a guest channel is allowed to address.
    pub consultants: Vec<String>,
    pub max_message_len: usize,
    pub session_idle_minutes: i64,
    pub cors_origin: Option<String>,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_owned(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            consultants: Vec::new(),
            max_message_len: 4000,
            session_idle_minutes: 30,
            cors_origin: None,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
        }
    }
}

impl Config {
    /// Reads the environment, after loading `.env` if one exists.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned())
            .parse()
            .context("BIND_ADDR is not a socket address")?;

        let max_message_len = match lookup("MAX_MESSAGE_LEN") {
            Some(value) => value.parse().context("MAX_MESSAGE_LEN is not a number")?,
            None => defaults.max_message_len,
        };
        if max_message_len == 0 {
            anyhow::bail!("MAX_MESSAGE_LEN must be positive");
        }

        let session_idle_minutes = match lookup("SESSION_IDLE_MINUTES") {
            Some(value) => value.parse().context("SESSION_IDLE_MINUTES is not a number")?,
            None => defaults.session_idle_minutes,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr,
            consultants: lookup("CONSULTANTS").map(|v| parse_list(&v)).unwrap_or_default(),
            max_message_len,
            session_idle_minutes,
            cors_origin: lookup("CORS_ORIGIN").filter(|v| !v.trim().is_empty()),
            log_filter: lookup("LOG_FILTER").unwrap_or(defaults.log_filter),
        })
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.bind_addr.port(), 8080);
        assert!(config.consultants.is_empty());
        assert_eq!(config.max_message_len, 4000);
        assert!(config.cors_origin.is_none());
    }

    #[test]
    fn consultants_are_trimmed_and_blank_entries_dropped() {
        let config = Config::from_lookup(lookup_from(&[("CONSULTANTS", " c1, ,c2 ,,")])).unwrap();
        assert_eq!(config.consultants, vec!["c1".to_owned(), "c2".to_owned()]);
    }

    #[test]
    fn bad_numbers_fail_startup() {
        assert!(Config::from_lookup(lookup_from(&[("MAX_MESSAGE_LEN", "lots")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("MAX_MESSAGE_LEN", "0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("BIND_ADDR", "nowhere")])).is_err());
    }
}
