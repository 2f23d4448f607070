//! # Fact Store
//!
//! Persistence seam shared by the Redis and in-memory backends.
//!
//! Every backend must serialize [`FactStore::apply_vote`] per fact so that two
//! racing requests can never both observe a voter as absent.
use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    error::AppError,
    fact::{Choice, Fact},
};

#[async_trait]
pub trait FactStore: Send + Sync {
    /// Persists a new fact published now. Fails on empty content.
    async fn create(&self, content: &str) -> Result<Fact, AppError>;

    /// Latest fact by publish time, `None` while the store is empty.
    async fn current(&self) -> Result<Option<Fact>, AppError>;

    async fn get(&self, id: Uuid) -> Result<Fact, AppError>;

    async fn apply_vote(&self, id: Uuid, voter_id: &str, choice: Choice)
    -> Result<Fact, AppError>;

    async fn voter_choice(&self, id: Uuid, voter_id: &str) -> Result<Option<Choice>, AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}

#[derive(Clone, Default)]
pub enum StorageStatus {
    #[default]
    Disconnected,
    Connecting {
        attempt: u32,
    },
    Ready(Arc<dyn FactStore>),
}

impl StorageStatus {
    pub fn label(&self) -> &'static str {
        match self {
            StorageStatus::Disconnected => "disconnected",
            StorageStatus::Connecting { .. } => "connecting",
            StorageStatus::Ready(_) => "ready",
        }
    }
}

impl fmt::Debug for StorageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageStatus::Connecting { attempt } => write!(f, "Connecting({attempt})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Current storage connection, readable from any handler.
#[derive(Clone)]
pub struct Storage {
    status: watch::Sender<StorageStatus>,
}

impl Storage {
    pub fn new() -> Self {
        let (status, _) = watch::channel(StorageStatus::Disconnected);
        Self { status }
    }

    pub fn ready(store: Arc<dyn FactStore>) -> Self {
        let storage = Self::new();
        storage.set(StorageStatus::Ready(store));
        storage
    }

    pub fn set(&self, status: StorageStatus) {
        self.status.send_replace(status);
    }

    pub fn status(&self) -> StorageStatus {
        self.status.borrow().clone()
    }

    #[cfg(test)]
    pub(crate) fn subscribe(&self) -> watch::Receiver<StorageStatus> {
        self.status.subscribe()
    }

    /// The store if connected, otherwise [`AppError::StorageUnavailable`].
    pub fn store(&self) -> Result<Arc<dyn FactStore>, AppError> {
        match &*self.status.borrow() {
            StorageStatus::Ready(store) => Ok(store.clone()),
            other => Err(AppError::StorageUnavailable(format!(
                "store is {}",
                other.label()
            ))),
        }
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}
