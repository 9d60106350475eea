use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::anyhow;
use tracing::info;

pub struct Config {
    pub host: String,
    pub port: u16,
    pub users_path: PathBuf,
    pub tweets_path: PathBuf,
    pub otel_enabled: bool,
    /// Keys that were unset and fell back to their defaults.
    defaulted: Vec<(&'static str, &'static str)>,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut defaulted = Vec::new();
        let mut load = |key: &'static str, default: &'static str| {
            let raw = lookup(key).unwrap_or_else(|| {
                defaulted.push((key, default));
                default.to_string()
            });
            (key, raw)
        };

        let host = load("HOST", "0.0.0.0");
        let port = load("PORT", "8000");
        let users_path = load("USERS_PATH", "data/users.json");
        let tweets_path = load("TWEETS_PATH", "data/tweets.json");
        let otel_enabled = load("OTEL_ENABLED", "false");

        Ok(Self {
            host: parse(host)?,
            port: parse(port)?,
            users_path: parse(users_path)?,
            tweets_path: parse(tweets_path)?,
            otel_enabled: parse(otel_enabled)?,
            defaulted,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Logged once the subscriber is up, since loading happens before it.
    pub fn log_summary(&self) {
        for (key, default) in &self.defaulted {
            info!("{key} not set, using default: {default}");
        }
        info!(
            address = %self.address(),
            users_path = %self.users_path.display(),
            tweets_path = %self.tweets_path.display(),
            otel_enabled = self.otel_enabled,
            "Configuration loaded"
        );
    }
}

/// Malformed values abort startup; `main` reports the error since no subscriber exists yet.
fn parse<T>((key, raw): (&str, String)) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| anyhow!("Invalid {key} value {raw:?}: {e}"))
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
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.address(), "0.0.0.0:8000");
        assert_eq!(config.users_path, PathBuf::from("data/users.json"));
        assert_eq!(config.tweets_path, PathBuf::from("data/tweets.json"));
        assert!(!config.otel_enabled);
        assert_eq!(config.defaulted.len(), 5);
    }

    #[test]
    fn only_unset_keys_are_recorded_as_defaulted() {
        let config = Config::from_lookup(lookup_from(&[("PORT", "9001"), ("HOST", "127.0.0.1")]))
            .unwrap();
        let keys: Vec<_> = config.defaulted.iter().map(|(key, _)| *key).collect();
        assert_eq!(keys, ["USERS_PATH", "TWEETS_PATH", "OTEL_ENABLED"]);
        assert!(config.defaulted.contains(&("OTEL_ENABLED", "false")));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "9001"),
            ("USERS_PATH", "/tmp/u.json"),
            ("OTEL_ENABLED", "true"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9001);
        assert_eq!(config.users_path, PathBuf::from("/tmp/u.json"));
        assert!(config.otel_enabled);
    }

    #[test]
    fn malformed_port_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "eighty")]))
            .err()
            .unwrap();
        assert!(err.to_string().contains("PORT"));
    }
}
