//! Store wrapper that injects seeded faults.

use std::{
    io,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use mistletoe_core::ParticipantId;
use mistletoe_server::{MemoryStore, RoundCommit, RoundState, Store, StoreError, UserRecord};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// In-memory store that fails a seeded fraction of operations.
///
/// Injected faults are raised before the inner store is touched, so a failed
/// commit never leaves anything behind.
#[derive(Debug)]
pub struct ChaoticStore {
    inner: MemoryStore,
    rng: Mutex<ChaCha8Rng>,
    commit_failure_rate: f64,
    load_failure_rate: f64,
    injected: AtomicUsize,
}

impl ChaoticStore {
    /// Wrap `inner` with no faults configured.
    #[must_use]
    pub fn new(inner: MemoryStore, seed: u64) -> Self {
        Self {
            inner,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            commit_failure_rate: 0.0,
            load_failure_rate: 0.0,
            injected: AtomicUsize::new(0),
        }
    }

    /// Fail this fraction of `commit_round` calls.
    #[must_use]
    pub fn with_commit_failure_rate(mut self, rate: f64) -> Self {
        self.commit_failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Fail this fraction of participant and round-state loads.
    #[must_use]
    pub fn with_load_failure_rate(mut self, rate: f64) -> Self {
        self.load_failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// The wrapped store.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Number of faults injected so far.
    pub fn injected(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    fn roll(&self, rate: f64, what: &str) -> Result<(), StoreError> {
        if rate <= 0.0 {
            return Ok(());
        }
        let hit = self.rng.lock().unwrap_or_else(PoisonError::into_inner).gen_bool(rate);
        if hit {
            self.injected.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("injecting {} fault", what);
            return Err(StoreError::Io(io::Error::other(format!("injected {what} fault"))));
        }
        Ok(())
    }
}

impl Store for ChaoticStore {
    fn load_user(&self, id: &ParticipantId) -> Result<Option<UserRecord>, StoreError> {
        self.inner.load_user(id)
    }

    fn load_participants(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.roll(self.load_failure_rate, "load")?;
        self.inner.load_participants()
    }

    fn load_round_state(&self) -> Result<RoundState, StoreError> {
        self.roll(self.load_failure_rate, "load")?;
        self.inner.load_round_state()
    }

    fn put_user(&self, user: UserRecord) -> Result<(), StoreError> {
        self.inner.put_user(user)
    }

    fn commit_round(&self, commit: &RoundCommit) -> Result<(), StoreError> {
        self.roll(self.commit_failure_rate, "commit")?;
        self.inner.commit_round(commit)
    }
}
