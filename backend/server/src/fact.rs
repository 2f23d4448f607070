//! # Facts
//!
//! The single votable record and the vote transition applied to it.
//!
//! ## Invariant
//!
//! `agrees + disagrees == voters.len()` after every successful transition.
//! Counters and the voter ledger are only ever touched together inside
//! [`FactRecord::record_vote`], which either mutates both or neither.
use std::{collections::HashMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Agree,
    Disagree,
}

impl Choice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Choice::Agree => "agree",
            Choice::Disagree => "disagree",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Choice {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agree" => Ok(Choice::Agree),
            "disagree" => Ok(Choice::Disagree),
            other => Err(AppError::Validation(format!(
                "choice must be \"agree\" or \"disagree\", got \"{other}\""
            ))),
        }
    }
}

/// Whether a voter who already voted may switch sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VotePolicy {
    /// A different choice replaces the recorded one.
    #[default]
    AllowChange,
    /// The first recorded choice is final.
    Locked,
}

impl VotePolicy {
    pub fn allows_change(&self) -> bool {
        matches!(self, VotePolicy::AllowChange)
    }
}

impl FromStr for VotePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "change" => Ok(VotePolicy::AllowChange),
            "locked" => Ok(VotePolicy::Locked),
            other => Err(format!("unknown vote policy \"{other}\"")),
        }
    }
}

/// Public view of a fact. The voter ledger never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    pub id: Uuid,
    pub content: String,
    pub published_at: DateTime<Utc>,
    pub agrees: u64,
    pub disagrees: u64,
}

impl Fact {
    pub fn new(content: String, published_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            published_at,
            agrees: 0,
            disagrees: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn total_votes(&self) -> u64 {
        self.agrees + self.disagrees
    }

    fn counter_mut(&mut self, choice: Choice) -> &mut u64 {
        match choice {
            Choice::Agree => &mut self.agrees,
            Choice::Disagree => &mut self.disagrees,
        }
    }
}

/// A fact together with its voter ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactRecord {
    pub fact: Fact,
    pub voters: HashMap<String, Choice>,
}

impl FactRecord {
    pub fn new(fact: Fact) -> Self {
        Self {
            fact,
            voters: HashMap::new(),
        }
    }

    pub fn choice_of(&self, voter_id: &str) -> Option<Choice> {
        self.voters.get(voter_id).copied()
    }

    /// Records `choice` for `voter_id`, or rejects with
    /// [`AppError::DuplicateVote`] carrying the choice already on record.
    pub fn record_vote(
        &mut self,
        voter_id: &str,
        choice: Choice,
        policy: VotePolicy,
    ) -> Result<(), AppError> {
        match self.choice_of(voter_id) {
            None => {
                self.voters.insert(voter_id.to_string(), choice);
                *self.fact.counter_mut(choice) += 1;
            }
            Some(previous) if previous == choice || !policy.allows_change() => {
                return Err(AppError::DuplicateVote { previous });
            }
            Some(previous) => {
                // previous was counted when it was recorded
                *self.fact.counter_mut(previous) -= 1;
                *self.fact.counter_mut(choice) += 1;
                self.voters.insert(voter_id.to_string(), choice);
            }
        }

        Ok(())
    }
}
