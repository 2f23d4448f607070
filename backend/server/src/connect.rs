//! # Store connection
//!
//! Bounded retry with exponential delay for bringing up the store, reported
//! through [`Storage`] so handlers can answer `503` while it is not ready.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::{
    database::RedisStore,
    error::AppError,
    fact::VotePolicy,
    memory::MemoryStore,
    store::{FactStore, Storage, StorageStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based), doubling up to `max_delay`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn FactStore>, AppError>;
}

pub struct RedisConnector {
    pub url: String,
    pub policy: VotePolicy,
}

#[async_trait]
impl Connector for RedisConnector {
    async fn connect(&self) -> Result<Arc<dyn FactStore>, AppError> {
        let store = RedisStore::connect(&self.url, self.policy).await?;
        Ok(Arc::new(store))
    }
}

pub struct MemoryConnector {
    pub policy: VotePolicy,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Arc<dyn FactStore>, AppError> {
        Ok(Arc::new(MemoryStore::new(self.policy)))
    }
}

/// Tries `connector` up to `policy.max_attempts` times, publishing each
/// attempt on `storage`. Leaves `storage` ready or disconnected.
pub async fn connect_with_retry(
    storage: &Storage,
    connector: &dyn Connector,
    policy: &RetryPolicy,
) -> Result<Arc<dyn FactStore>, AppError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        storage.set(StorageStatus::Connecting { attempt });

        match connector.connect().await {
            Ok(store) => {
                info!("Store connected on attempt {attempt}");
                storage.set(StorageStatus::Ready(store.clone()));
                return Ok(store);
            }
            Err(e) => {
                warn!("Store connection attempt {attempt}/{attempts} failed: {e}");
                last_error = Some(e);
            }
        }

        if attempt < attempts {
            sleep(policy.delay(attempt)).await;
        }
    }

    error!("Giving up on store after {attempts} attempts");
    storage.set(StorageStatus::Disconnected);

    Err(last_error
        .unwrap_or_else(|| AppError::StorageUnavailable("no connection attempts made".into())))
}
