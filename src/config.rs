use crate::db::RetryPolicy;
use crate::error::ConfigError;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration.
///
/// | Variable | Default |
/// |---|---|
/// | `DATABASE_URL` | *(required)* |
/// | `BIND_ADDR` | `0.0.0.0:8080` |
/// | `DB_MAX_CONNECTIONS` | `20` |
/// | `STORE_TIMEOUT_SECS` | `25` |
/// | `STORE_RETRIES` | `3` |
/// | `STORE_BACKOFF_MS` | `1000` |
/// | `HEARTBEAT_SECS` | `15` |
/// | `SUBSCRIBER_CAPACITY` | `64` |
/// | `HEALTH_CHECK_SECS` | `60` |
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub retry: RetryPolicy,
    pub heartbeat: Duration,
    pub subscriber_capacity: usize,
    pub health_check: Duration,
}

impl Config {
    /// Reads `.env` if present, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env_fn(|key| std::env::var(key).ok())
    }

    fn from_env_fn<F>(env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = env("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            database_url,
            bind_addr: parse_or(&env, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            db_max_connections: parse_or(&env, "DB_MAX_CONNECTIONS", 20)?,
            retry: RetryPolicy {
                attempts: parse_or(&env, "STORE_RETRIES", 3)?,
                timeout: Duration::from_secs(parse_or(&env, "STORE_TIMEOUT_SECS", 25)?),
                backoff: Duration::from_millis(parse_or(&env, "STORE_BACKOFF_MS", 1000)?),
            },
            heartbeat: Duration::from_secs(parse_or(&env, "HEARTBEAT_SECS", 15)?),
            subscriber_capacity: parse_or(&env, "SUBSCRIBER_CAPACITY", 64)?,
            health_check: Duration::from_secs(parse_or(&env, "HEALTH_CHECK_SECS", 60)?),
        })
    }
}

fn parse_or<F, T>(env: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match env(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = Config::from_env_fn(lookup(&[("DATABASE_URL", "postgres://localhost/survey")]))
            .unwrap();
        assert_eq!(config.bind_addr, SocketAddr::from(([0, 0, 0, 0], 8080)));
        assert_eq!(config.heartbeat, Duration::from_secs(15));
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.retry.timeout, Duration::from_secs(25));
        assert_eq!(config.retry.backoff, Duration::from_secs(1));
        assert_eq!(config.subscriber_capacity, 64);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_env_fn(lookup(&[
            ("DATABASE_URL", "postgres://db/survey"),
            ("BIND_ADDR", "127.0.0.1:3000"),
            ("HEARTBEAT_SECS", "5"),
            ("STORE_RETRIES", " 5 "),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.heartbeat, Duration::from_secs(5));
        assert_eq!(config.retry.attempts, 5);
    }

    #[test]
    fn missing_url_and_bad_numbers_are_errors() {
        assert!(matches!(
            Config::from_env_fn(lookup(&[])),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
        assert!(matches!(
            Config::from_env_fn(lookup(&[("DATABASE_URL", "x"), ("HEARTBEAT_SECS", "soon")])),
            Err(ConfigError::Invalid { key: "HEARTBEAT_SECS", .. })
        ));
    }
}
