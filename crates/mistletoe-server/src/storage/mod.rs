//! Roster and round-state persistence.
//!
//! The store is the only state shared between trigger invocations. Reads are
//! plain snapshots; the single write path is [`Store::commit_round`], which
//! must apply the round-state transition and every giftee write atomically.
//!
//! # Invariants
//!
//! - Commit is compare-and-swap: it succeeds only while the round is `Open`
//! - All-or-nothing: a failed commit leaves users and round state untouched
//! - Commits never wait on another writer; contention is reported

mod file;
mod memory;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
pub use file::FileStore;
pub use memory::MemoryStore;
use mistletoe_core::{Participant, ParticipantId};
use serde::{Deserialize, Serialize};

use crate::round::{RoundCommit, RoundState};

/// A user document as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Document id
    pub id: ParticipantId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Administrators trigger rounds and are never paired
    #[serde(default)]
    pub is_admin: bool,
    /// Declared conflicts
    #[serde(default)]
    pub conflicts: Vec<ParticipantId>,
    /// Assigned giftee, written only by a round commit
    #[serde(default, alias = "assignedGifteeId")]
    pub giftee_id: Option<ParticipantId>,
}

impl UserRecord {
    /// A non-admin participant with no conflicts.
    pub fn participant(id: impl Into<ParticipantId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_admin: false,
            conflicts: Vec::new(),
            giftee_id: None,
        }
    }

    /// An administrator.
    pub fn admin(id: impl Into<ParticipantId>, name: impl Into<String>) -> Self {
        Self { is_admin: true, ..Self::participant(id, name) }
    }

    /// Builder-style helper to declare conflicts.
    #[must_use]
    pub fn with_conflicts<I, T>(mut self, conflicts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ParticipantId>,
    {
        self.conflicts = conflicts.into_iter().map(Into::into).collect();
        self
    }

    /// Roster view of this user.
    pub fn into_participant(self) -> Participant {
        Participant { id: self.id, name: self.name, conflicts: self.conflicts }
    }
}

/// Whole store contents.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreDocument {
    /// Users by id
    pub users: BTreeMap<ParticipantId, UserRecord>,
    /// Round state singleton
    pub round: RoundState,
}

impl StoreDocument {
    /// Non-admin users, in id order.
    pub fn participants(&self) -> Vec<UserRecord> {
        self.users.values().filter(|u| !u.is_admin).cloned().collect()
    }

    /// Apply a round commit to a copy of this document.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyLocked` if the round is not open and
    /// `StoreError::UnknownParticipant` if a giver or giftee is missing or has
    /// become an administrator since the snapshot was taken.
    pub fn committed(&self, commit: &RoundCommit) -> Result<Self, StoreError> {
        let round = self.round.transition(commit)?;

        let mut next = self.clone();
        for (giver, giftee) in commit.assignment.iter() {
            if !self.users.get(giftee).is_some_and(|u| !u.is_admin) {
                return Err(StoreError::UnknownParticipant(giftee.clone()));
            }
            match next.users.get_mut(giver) {
                Some(user) if !user.is_admin => user.giftee_id = Some(giftee.clone()),
                _ => return Err(StoreError::UnknownParticipant(giver.clone())),
            }
        }
        next.round = round;

        Ok(next)
    }
}

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The round was already locked
    #[error("round already locked at {locked_at}")]
    AlreadyLocked {
        /// When the winning commit locked the round
        locked_at: DateTime<Utc>,
    },

    /// Another writer holds the store right now
    #[error("store is being written by another trigger")]
    Contended,

    /// A commit referenced a user that is not a current participant
    #[error("unknown participant: {0}")]
    UnknownParticipant(ParticipantId),

    /// Underlying I/O failed
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored bytes could not be encoded or decoded
    #[error("store codec error: {0}")]
    Codec(String),
}

/// Persistence backend for users and round state.
pub trait Store: Send + Sync {
    /// Load one user by id.
    fn load_user(&self, id: &ParticipantId) -> Result<Option<UserRecord>, StoreError>;

    /// Load every non-admin user.
    fn load_participants(&self) -> Result<Vec<UserRecord>, StoreError>;

    /// Load the round state singleton.
    fn load_round_state(&self) -> Result<RoundState, StoreError>;

    /// Insert or replace a user.
    fn put_user(&self, user: UserRecord) -> Result<(), StoreError>;

    /// Atomically write every giftee and lock the round.
    fn commit_round(&self, commit: &RoundCommit) -> Result<(), StoreError>;
}
