//! # Redis
//!
//! Durable fact store.
//!
//! Core purpose is to store facts, their vote counters and the per-fact voter
//! ledger, and to apply votes atomically.
//!
//! ## Requirements
//!
//! - O(1) lookup of a voter's recorded choice
//! - O(log n) lookup of the current fact
//! - Counters and ledger change together or not at all
//!
//! ## Implementation
//!
//! - `fact:{id}`: hash with `content`, `published_at` (RFC 3339), `agrees`, `disagrees`
//! - `fact:{id}:voters`: hash of voter id to `agree`/`disagree`
//! - `facts:published`: sorted set of fact ids scored by publish time in microseconds
//! - Creation is a `MULTI` pipeline, votes run as one Lua script
//! - Redis runs scripts one at a time, so no two votes on a fact can interleave
use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{
    AsyncCommands, Client, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::AppError,
    fact::{Choice, Fact, VotePolicy},
    store::FactStore,
    utils::normalize_content,
};

pub const PUBLISHED_KEY: &str = "facts:published";

const FIELD_CONTENT: &str = "content";
const FIELD_PUBLISHED_AT: &str = "published_at";
const FIELD_AGREES: &str = "agrees";
const FIELD_DISAGREES: &str = "disagrees";

// Counter fields are named after the choice plus "s".
const VOTE_SCRIPT: &str = r"
local fact = KEYS[1]
local voters = KEYS[2]
local voter = ARGV[1]
local choice = ARGV[2]
local allow_change = ARGV[3] == '1'

if redis.call('EXISTS', fact) == 0 then
    return {'missing'}
end

local previous = redis.call('HGET', voters, voter)
if previous then
    if previous == choice or not allow_change then
        return {'duplicate', previous}
    end
    redis.call('HINCRBY', fact, previous .. 's', -1)
end

redis.call('HSET', voters, voter, choice)
redis.call('HINCRBY', fact, choice .. 's', 1)

return redis.call('HGETALL', fact)
";

pub fn fact_key(id: Uuid) -> String {
    format!("fact:{id}")
}

pub fn voters_key(id: Uuid) -> String {
    format!("fact:{id}:voters")
}

pub async fn init_redis(redis_url: &str) -> Result<ConnectionManager, AppError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(500));

    let client = Client::open(redis_url)?;
    let connection_manager = client.get_connection_manager_with_config(config).await?;

    Ok(connection_manager)
}

pub struct RedisStore {
    connection: ConnectionManager,
    policy: VotePolicy,
    vote_script: Script,
}

impl RedisStore {
    pub async fn connect(redis_url: &str, policy: VotePolicy) -> Result<Self, AppError> {
        let store = Self {
            connection: init_redis(redis_url).await?,
            policy,
            vote_script: Script::new(VOTE_SCRIPT),
        };
        store.ping().await?;

        info!("Connected to Redis");
        Ok(store)
    }
}

#[async_trait]
impl FactStore for RedisStore {
    async fn create(&self, content: &str) -> Result<Fact, AppError> {
        let content = normalize_content(content)?;
        let fact = Fact::new(content, Utc::now());
        let mut connection = self.connection.clone();

        let fields = [
            (FIELD_CONTENT, fact.content.clone()),
            (FIELD_PUBLISHED_AT, fact.published_at.to_rfc3339()),
            (FIELD_AGREES, "0".to_string()),
            (FIELD_DISAGREES, "0".to_string()),
        ];

        let () = redis::pipe()
            .atomic()
            .hset_multiple(fact_key(fact.id), &fields)
            .ignore()
            .zadd(
                PUBLISHED_KEY,
                fact.id.to_string(),
                fact.published_at.timestamp_micros(),
            )
            .ignore()
            .query_async(&mut connection)
            .await?;

        debug!("Stored fact {}", fact.id);
        Ok(fact)
    }

    async fn current(&self) -> Result<Option<Fact>, AppError> {
        let mut connection = self.connection.clone();
        let ids: Vec<String> = connection.zrevrange(PUBLISHED_KEY, 0, 0).await?;

        let Some(id) = ids.first() else {
            return Ok(None);
        };

        let id = Uuid::parse_str(id)
            .map_err(|e| AppError::StorageUnavailable(format!("corrupt fact id {id}: {e}")))?;

        self.get(id).await.map(Some)
    }

    async fn get(&self, id: Uuid) -> Result<Fact, AppError> {
        let mut connection = self.connection.clone();
        let fields: HashMap<String, String> = connection.hgetall(fact_key(id)).await?;

        fact_from_fields(id, &fields)
    }

    async fn apply_vote(
        &self,
        id: Uuid,
        voter_id: &str,
        choice: Choice,
    ) -> Result<Fact, AppError> {
        let mut connection = self.connection.clone();

        let reply: Vec<String> = self
            .vote_script
            .key(fact_key(id))
            .key(voters_key(id))
            .arg(voter_id)
            .arg(choice.as_str())
            .arg(if self.policy.allows_change() { "1" } else { "0" })
            .invoke_async(&mut connection)
            .await?;

        match reply.first().map(String::as_str) {
            Some("missing") => Err(AppError::NotFound),
            Some("duplicate") => {
                let previous = reply
                    .get(1)
                    .ok_or_else(|| corrupt(id, "duplicate reply without choice"))?
                    .parse()
                    .map_err(|_| corrupt(id, "unknown recorded choice"))?;

                Err(AppError::DuplicateVote { previous })
            }
            _ => {
                let fields = reply
                    .chunks_exact(2)
                    .map(|pair| (pair[0].clone(), pair[1].clone()))
                    .collect();

                fact_from_fields(id, &fields)
            }
        }
    }

    async fn voter_choice(&self, id: Uuid, voter_id: &str) -> Result<Option<Choice>, AppError> {
        let mut connection = self.connection.clone();

        let (exists, choice): (bool, Option<String>) = redis::pipe()
            .exists(fact_key(id))
            .hget(voters_key(id), voter_id)
            .query_async(&mut connection)
            .await?;

        if !exists {
            return Err(AppError::NotFound);
        }

        choice
            .map(|c| c.parse().map_err(|_| corrupt(id, "unknown recorded choice")))
            .transpose()
    }

    async fn ping(&self) -> Result<(), AppError> {
        let mut connection = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut connection).await?;

        Ok(())
    }
}

fn corrupt(id: Uuid, reason: &str) -> AppError {
    AppError::StorageUnavailable(format!("fact {id}: {reason}"))
}

fn fact_from_fields(id: Uuid, fields: &HashMap<String, String>) -> Result<Fact, AppError> {
    if fields.is_empty() {
        return Err(AppError::NotFound);
    }

    let field = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| corrupt(id, &format!("missing {name}")))
    };
    let counter = |name: &str| -> Result<u64, AppError> {
        field(name)?
            .parse()
            .map_err(|_| corrupt(id, &format!("invalid {name}")))
    };

    let published_at = DateTime::parse_from_rfc3339(field(FIELD_PUBLISHED_AT)?)
        .map_err(|_| corrupt(id, "invalid published_at"))?
        .with_timezone(&Utc);

    Ok(Fact {
        id,
        content: field(FIELD_CONTENT)?.clone(),
        published_at,
        agrees: counter(FIELD_AGREES)?,
        disagrees: counter(FIELD_DISAGREES)?,
    })
}
