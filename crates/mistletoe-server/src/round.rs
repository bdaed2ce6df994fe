//! Round state.
//!
//! A round is either `Open` (may run) or `Locked` (has run and is immutable
//! until an administrator resets it). The only transition the engine performs
//! is `Open → Locked`, applied by a store inside its commit critical section.

use chrono::{DateTime, Utc};
use mistletoe_core::Assignment;
use serde::{Deserialize, Serialize};

use crate::storage::StoreError;

/// Outcome details recorded alongside the lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundMetadata {
    /// Number of giver → giftee pairings written
    pub pairings_count: usize,
    /// Non-fatal warnings raised while resolving
    pub warnings: Vec<String>,
    /// When the assignment was computed
    pub completed_at: DateTime<Utc>,
}

/// Singleton round state record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum RoundState {
    /// No assignment committed yet
    #[default]
    Open,

    /// Assignment committed; the engine refuses to run again
    Locked {
        /// When the lock was taken
        #[serde(rename = "lockInTime")]
        lock_in_time: DateTime<Utc>,
        /// What the round produced
        metadata: RoundMetadata,
    },
}

impl RoundState {
    /// Whether the round has already run.
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }

    /// Lock timestamp, if locked.
    pub fn lock_in_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Open => None,
            Self::Locked { lock_in_time, .. } => Some(*lock_in_time),
        }
    }

    /// Compute the state after committing `commit`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyLocked` unless the round is `Open`.
    pub fn transition(&self, commit: &RoundCommit) -> Result<Self, StoreError> {
        match self {
            Self::Open => Ok(Self::Locked {
                lock_in_time: commit.lock_in_time,
                metadata: commit.metadata.clone(),
            }),
            Self::Locked { lock_in_time, .. } => {
                Err(StoreError::AlreadyLocked { locked_at: *lock_in_time })
            },
        }
    }
}

/// Everything a store writes when a round completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundCommit {
    /// Giver → giftee pairs to persist
    pub assignment: Assignment,
    /// Lock timestamp
    pub lock_in_time: DateTime<Utc>,
    /// Round metadata
    pub metadata: RoundMetadata,
}
