//! Round Lock
//!
//! Test-and-set guard that makes a round one-shot.
//!
//! ## Discipline
//!
//! - Check: a cheap read rejects triggers against a locked round before any
//!   computation
//! - Compute: resolution runs without holding anything
//! - Commit: the store's compare-and-swap decides the winner; a loser reports
//!   `AlreadyLocked` and its result is discarded
//!
//! The pre-check is an optimisation only. Correctness rests on the commit.

use crate::{
    error::TriggerError,
    round::{RoundCommit, RoundState},
    storage::Store,
};

/// Round lock over a store.
#[derive(Debug)]
pub struct RoundLock<'a, S>
where
    S: Store,
{
    store: &'a S,
}

impl<'a, S> RoundLock<'a, S>
where
    S: Store,
{
    /// Guard the round kept in `store`.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Current round state.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Internal` if the store cannot be read.
    pub fn state(&self) -> Result<RoundState, TriggerError> {
        Ok(self.store.load_round_state()?)
    }

    /// Reject early if the round has already run.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::AlreadyLocked` when locked.
    pub fn ensure_open(&self) -> Result<(), TriggerError> {
        match self.state()? {
            RoundState::Open => Ok(()),
            RoundState::Locked { lock_in_time, .. } => {
                Err(TriggerError::AlreadyLocked { locked_at: Some(lock_in_time) })
            },
        }
    }

    /// Transition `Open → Locked` together with the assignment writes.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::AlreadyLocked` if another trigger won (or is
    /// committing right now) and `TriggerError::Internal` for store faults.
    /// Nothing is written in either case.
    pub fn commit(&self, commit: &RoundCommit) -> Result<(), TriggerError> {
        self.store.commit_round(commit)?;
        tracing::info!("round locked at {}", commit.lock_in_time);
        Ok(())
    }
}
