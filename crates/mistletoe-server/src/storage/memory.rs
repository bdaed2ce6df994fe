//! In-memory store.

use std::sync::{Mutex, MutexGuard};

use mistletoe_core::ParticipantId;

use super::{Store, StoreDocument, StoreError, UserRecord};
use crate::round::{RoundCommit, RoundState};

/// Store backed by a mutex-guarded document.
///
/// The mutex is held only for the duration of a single read or commit, so the
/// commit's check-and-set is atomic with respect to every other caller in the
/// process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<StoreDocument>,
}

impl MemoryStore {
    /// Create an empty store with an open round.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with users.
    pub fn with_users(users: impl IntoIterator<Item = UserRecord>) -> Self {
        let document = StoreDocument {
            users: users.into_iter().map(|u| (u.id.clone(), u)).collect(),
            ..StoreDocument::default()
        };
        Self { document: Mutex::new(document) }
    }

    /// Copy of the whole document.
    pub fn snapshot(&self) -> StoreDocument {
        self.document().clone()
    }

    fn document(&self) -> MutexGuard<'_, StoreDocument> {
        // A panic while holding the guard cannot leave a half-applied commit:
        // commits swap in a fully built document.
        self.document.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Store for MemoryStore {
    fn load_user(&self, id: &ParticipantId) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.document().users.get(id).cloned())
    }

    fn load_participants(&self) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self.document().participants())
    }

    fn load_round_state(&self) -> Result<RoundState, StoreError> {
        Ok(self.document().round.clone())
    }

    fn put_user(&self, user: UserRecord) -> Result<(), StoreError> {
        self.document().users.insert(user.id.clone(), user);
        Ok(())
    }

    fn commit_round(&self, commit: &RoundCommit) -> Result<(), StoreError> {
        let mut document = self.document();
        *document = document.committed(commit)?;
        Ok(())
    }
}
