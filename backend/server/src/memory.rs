//! # In-memory store
//!
//! Process-local [`FactStore`] used when no Redis URL is configured and in
//! tests. Nothing survives a restart.
//!
//! Each fact sits behind its own mutex; the outer lock only guards the index,
//! so votes on one fact never wait on votes for another.
use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::AppError,
    fact::{Choice, Fact, FactRecord, VotePolicy},
    store::FactStore,
    utils::normalize_content,
};

#[derive(Default)]
struct Index {
    facts: HashMap<Uuid, Arc<Mutex<FactRecord>>>,
    latest: Option<(Uuid, DateTime<Utc>)>,
}

pub struct MemoryStore {
    policy: VotePolicy,
    index: RwLock<Index>,
}

impl MemoryStore {
    pub fn new(policy: VotePolicy) -> Self {
        Self {
            policy,
            index: RwLock::new(Index::default()),
        }
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.index.read().await.facts.len()
    }

    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn entry(&self, id: Uuid) -> Result<Arc<Mutex<FactRecord>>, AppError> {
        self.index
            .read()
            .await
            .facts
            .get(&id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    /// Snapshot of a fact and its voter ledger.
    #[cfg(test)]
    pub(crate) async fn record(&self, id: Uuid) -> Result<FactRecord, AppError> {
        let record = self.entry(id).await?;
        let record = record.lock().await;

        Ok(record.clone())
    }

    /// Inserts with an explicit publish time.
    async fn insert_at(
        &self,
        content: &str,
        published_at: DateTime<Utc>,
    ) -> Result<Fact, AppError> {
        let content = normalize_content(content)?;
        let fact = Fact::new(content, published_at);

        let mut index = self.index.write().await;

        // ties go to the newest insert
        if index
            .latest
            .is_none_or(|(_, latest)| published_at >= latest)
        {
            index.latest = Some((fact.id, published_at));
        }
        index
            .facts
            .insert(fact.id, Arc::new(Mutex::new(FactRecord::new(fact.clone()))));

        debug!("Stored fact {}", fact.id);
        Ok(fact)
    }
}

#[async_trait]
impl FactStore for MemoryStore {
    async fn create(&self, content: &str) -> Result<Fact, AppError> {
        self.insert_at(content, Utc::now()).await
    }

    async fn current(&self) -> Result<Option<Fact>, AppError> {
        let entry = {
            let index = self.index.read().await;
            index
                .latest
                .and_then(|(id, _)| index.facts.get(&id).cloned())
        };

        match entry {
            Some(record) => Ok(Some(record.lock().await.fact.clone())),
            None => Ok(None),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Fact, AppError> {
        let record = self.entry(id).await?;
        let record = record.lock().await;

        Ok(record.fact.clone())
    }

    async fn apply_vote(
        &self,
        id: Uuid,
        voter_id: &str,
        choice: Choice,
    ) -> Result<Fact, AppError> {
        let record = self.entry(id).await?;
        let mut record = record.lock().await;

        record.record_vote(voter_id, choice, self.policy)?;

        Ok(record.fact.clone())
    }

    async fn voter_choice(&self, id: Uuid, voter_id: &str) -> Result<Option<Choice>, AppError> {
        let record = self.entry(id).await?;
        let record = record.lock().await;

        Ok(record.choice_of(voter_id))
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
