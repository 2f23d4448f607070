use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::{connect::RetryPolicy, error::StartupError, fact::VotePolicy};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// `None` runs against the in-memory store.
    pub redis_url: Option<String>,
    pub vote_policy: VotePolicy,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn load() -> Result<Self, StartupError> {
        Self::from_lookup(|key| env::var(key).ok(), read_secret)
    }

    /// Builds a config from arbitrary variable and secret sources.
    pub fn from_lookup<V, S>(var: V, secret: S) -> Result<Self, StartupError>
    where
        V: Fn(&str) -> Option<String>,
        S: Fn(&str) -> Option<String>,
    {
        let redis_url = var("REDIS_URL").or_else(|| secret("REDIS_URL"));
        if redis_url.is_none() {
            warn!("REDIS_URL not set, facts will only live in memory");
        }

        Ok(Self {
            port: try_load(&var, "RUST_PORT", "1111")?,
            redis_url,
            vote_policy: try_load(&var, "VOTE_POLICY", "change")?,
            retry: RetryPolicy {
                max_attempts: try_load(&var, "STORE_CONNECT_ATTEMPTS", "5")?,
                base_delay: Duration::from_millis(try_load(&var, "STORE_CONNECT_BASE_MS", "100")?),
                max_delay: Duration::from_millis(try_load(&var, "STORE_CONNECT_MAX_MS", "5000")?),
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 1111,
            redis_url: None,
            vote_policy: VotePolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

fn try_load<T, V>(var: &V, key: &str, default: &str) -> Result<T, StartupError>
where
    T: FromStr,
    T::Err: Display,
    V: Fn(&str) -> Option<String>,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            StartupError::Config {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            info!("No {secret_name} secret file: {e}");
        })
        .ok()
        .filter(|s| !s.is_empty())
}
