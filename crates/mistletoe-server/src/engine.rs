//! Pairing Engine
//!
//! Orchestrates one trigger call end to end.
//!
//! ## Pipeline
//!
//! 1. Authorize: caller must be an administrator (no reads beyond the caller's
//!    own user document before this passes)
//! 2. Round lock pre-check: a locked round is rejected without computation
//! 3. Snapshot: read the roster once; later edits do not affect this call
//! 4. Canonicalize exclusions and resolve the assignment (no locks held)
//! 5. Commit: the round lock's compare-and-swap writes every giftee and locks
//!    the round, or writes nothing
//! 6. Report
//!
//! Steps 3 and 4 are speculative. Two racing triggers may both compute an
//! assignment, but only the one whose commit wins is ever visible.

use mistletoe_core::{Environment, ExclusionGraph, Resolution, Resolver, RosterSnapshot};

use crate::{
    auth::{self, Caller},
    config::EngineConfig,
    error::TriggerError,
    report::PairingReport,
    round::{RoundCommit, RoundMetadata},
    round_lock::RoundLock,
    storage::{Store, UserRecord},
};

/// Trigger endpoint for a store.
#[derive(Debug)]
pub struct PairingEngine<E, S>
where
    E: Environment,
    S: Store,
{
    env: E,
    store: S,
    config: EngineConfig,
}

impl<E, S> PairingEngine<E, S>
where
    E: Environment,
    S: Store,
{
    /// Create an engine over a store.
    pub fn new(env: E, store: S, config: EngineConfig) -> Self {
        Self { env, store, config }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Round lock over the backing store.
    pub fn round_lock(&self) -> RoundLock<'_, S> {
        RoundLock::new(&self.store)
    }

    /// Run a round on behalf of `caller`.
    ///
    /// # Errors
    ///
    /// - `TriggerError::Unauthorized`: caller missing or not an administrator
    /// - `TriggerError::AlreadyLocked`: the round already ran or another
    ///   trigger is committing
    /// - `TriggerError::Infeasible`: conflicts rule out every assignment
    /// - `TriggerError::Internal`: corrupt roster, store fault, or exceeded
    ///   deadline
    ///
    /// Only success writes anything.
    pub fn trigger(&self, caller: Option<&Caller>) -> Result<PairingReport, TriggerError> {
        let result = self.run(caller);

        match &result {
            Ok(report) => tracing::info!(
                "pairing completed: {} pairings, {} warnings",
                report.pairings_count,
                report.warnings.len()
            ),
            Err(e @ TriggerError::Internal(_)) => tracing::error!("pairing failed: {}", e),
            Err(e) => tracing::warn!("pairing rejected ({}): {}", e.reason().as_str(), e),
        }

        result
    }

    fn run(&self, caller: Option<&Caller>) -> Result<PairingReport, TriggerError> {
        let admin = auth::authorize(&self.store, caller, &self.config)?;
        tracing::info!("pairing triggered by {}", admin);

        let lock = self.round_lock();
        lock.ensure_open()?;

        let users = self.store.load_participants()?;
        let participants = users.into_iter().map(UserRecord::into_participant).collect();
        let roster = RosterSnapshot::new(participants)
            .map_err(|e| TriggerError::Internal(format!("corrupt roster: {e}")))?;
        tracing::debug!("roster snapshot holds {} participants", roster.len());

        let (graph, diagnostics) = ExclusionGraph::build(&roster);
        let resolver = Resolver::new(self.env.clone(), self.config.resolver.clone());
        let Resolution { assignment, warnings: resolver_warnings, phase } =
            resolver.resolve(&roster, &graph)?;
        tracing::debug!("assignment found by {:?} phase", phase);

        assignment
            .verify(&roster, &graph)
            .map_err(|e| TriggerError::Internal(format!("algorithm error: {e}")))?;

        let mut warnings = diagnostics.warnings();
        warnings.extend(resolver_warnings);

        let completed_at = self.env.wall_clock();
        let metadata = RoundMetadata { pairings_count: assignment.len(), warnings, completed_at };
        let commit = RoundCommit { assignment, lock_in_time: completed_at, metadata };

        lock.commit(&commit)?;

        Ok(PairingReport::from_metadata(&commit.metadata))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use chrono::{DateTime, TimeZone, Utc};
    use mistletoe_core::EntropyError;

    use super::*;
    use crate::{report::FailureReason, storage::MemoryStore};

    #[derive(Clone)]
    struct FixedEnv;

    impl Environment for FixedEnv {
        fn now(&self) -> Instant {
            Instant::now()
        }

        fn wall_clock(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2025, 12, 1, 9, 30, 0).unwrap()
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = u8::try_from(i % 251).unwrap();
            }
        }
    }

    #[derive(Clone)]
    struct NoEntropyEnv;

    impl Environment for NoEntropyEnv {
        fn now(&self) -> Instant {
            Instant::now()
        }

        fn wall_clock(&self) -> DateTime<Utc> {
            FixedEnv.wall_clock()
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(0);
        }

        fn try_random_bytes(&self, _buffer: &mut [u8]) -> Result<(), EntropyError> {
            Err(EntropyError("device unavailable".into()))
        }
    }

    fn engine(users: Vec<UserRecord>) -> PairingEngine<FixedEnv, MemoryStore> {
        let mut all = vec![UserRecord::admin("admin", "Admin")];
        all.extend(users);
        PairingEngine::new(FixedEnv, MemoryStore::with_users(all), EngineConfig::default())
    }

    fn admin() -> Caller {
        Caller::new("admin@example.org")
    }

    #[test]
    fn trigger_pairs_and_locks() {
        let engine = engine(vec![
            UserRecord::participant("alice", "Alice"),
            UserRecord::participant("bob", "Bob"),
            UserRecord::participant("carol", "Carol"),
        ]);

        let report = engine.trigger(Some(&admin())).unwrap();
        assert_eq!(report.pairings_count, 3);
        assert_eq!(report.timestamp, "2025-12-01T09:30:00.000Z");
        assert!(report.warnings.is_empty());

        let state = engine.store().load_round_state().unwrap();
        assert!(state.is_locked());
        for user in engine.store().load_participants().unwrap() {
            let giftee = user.giftee_id.unwrap();
            assert_ne!(giftee, user.id);
        }
        assert!(engine.store().load_user(&"admin".into()).unwrap().unwrap().giftee_id.is_none());
    }

    #[test]
    fn asymmetric_conflict_warns() {
        let engine = engine(vec![
            UserRecord::participant("alice", "Alice").with_conflicts(["bob"]),
            UserRecord::participant("bob", "Bob"),
            UserRecord::participant("carol", "Carol"),
            UserRecord::participant("dave", "Dave"),
        ]);

        let report = engine.trigger(Some(&admin())).unwrap();
        assert_eq!(report.pairings_count, 4);
        assert!(report.warnings.iter().any(|w| w.to_lowercase().contains("asymmetric")));
    }

    #[test]
    fn unauthorized_trigger_touches_nothing() {
        let engine = engine(vec![
            UserRecord::participant("alice", "Alice"),
            UserRecord::participant("bob", "Bob"),
        ]);
        let before = engine.store().snapshot();

        let err = engine.trigger(Some(&Caller::new("alice@example.org"))).unwrap_err();
        assert_eq!(err.reason(), FailureReason::Unauthorized);
        let err = engine.trigger(None).unwrap_err();
        assert_eq!(err.reason(), FailureReason::Unauthorized);

        assert_eq!(engine.store().snapshot(), before);
    }

    #[test]
    fn infeasible_round_stays_open() {
        let engine = engine(vec![
            UserRecord::participant("alice", "Alice").with_conflicts(["bob", "carol"]),
            UserRecord::participant("bob", "Bob"),
            UserRecord::participant("carol", "Carol"),
        ]);
        let before = engine.store().snapshot();

        let err = engine.trigger(Some(&admin())).unwrap_err();
        assert_eq!(err.reason(), FailureReason::Infeasible);
        assert!(err.to_string().contains("conflicted with all other participants"));
        assert_eq!(engine.store().snapshot(), before);
    }

    #[test]
    fn second_trigger_is_already_locked() {
        let engine = engine(vec![
            UserRecord::participant("alice", "Alice"),
            UserRecord::participant("bob", "Bob"),
        ]);

        engine.trigger(Some(&admin())).unwrap();
        let after_first = engine.store().snapshot();

        let err = engine.trigger(Some(&admin())).unwrap_err();
        assert!(matches!(err, TriggerError::AlreadyLocked { locked_at: Some(_) }));
        assert_eq!(engine.store().snapshot(), after_first);
    }

    #[test]
    fn blank_roster_id_is_internal() {
        let engine = engine(vec![
            UserRecord::participant("", "Ghost"),
            UserRecord::participant("alice", "Alice"),
            UserRecord::participant("bob", "Bob"),
        ]);

        let err = engine.trigger(Some(&admin())).unwrap_err();
        assert_eq!(err.reason(), FailureReason::Internal);
        assert!(err.is_retryable());
        assert!(!engine.store().load_round_state().unwrap().is_locked());
    }

    #[test]
    fn warnings_are_grouped_by_kind() {
        let engine = engine(vec![
            UserRecord::participant("alice", "Alice")
                .with_conflicts(["ghost", "erin", "bob", "dave", "carol"]),
            UserRecord::participant("bob", "Bob"),
            UserRecord::participant("carol", "Carol"),
            UserRecord::participant("dave", "Dave"),
            UserRecord::participant("erin", "Erin"),
            UserRecord::participant("frank", "Frank"),
        ]);

        let report = engine.trigger(Some(&admin())).unwrap();
        let expected_prefixes = [
            "alice lists unknown participant ghost",
            "asymmetric conflict: alice lists bob",
            "asymmetric conflict: alice lists carol",
            "asymmetric conflict: alice lists dave",
            "asymmetric conflict: alice lists erin",
            "alice excludes 4 of 6",
        ];
        assert_eq!(report.warnings.len(), expected_prefixes.len(), "{:?}", report.warnings);
        for (warning, prefix) in report.warnings.iter().zip(expected_prefixes) {
            assert!(warning.starts_with(prefix), "{warning:?} should start with {prefix:?}");
        }
    }

    #[test]
    fn entropy_failure_leaves_round_open() {
        let store = MemoryStore::with_users([
            UserRecord::admin("admin", "Admin"),
            UserRecord::participant("alice", "Alice"),
            UserRecord::participant("bob", "Bob"),
            UserRecord::participant("carol", "Carol"),
        ]);
        let engine = PairingEngine::new(NoEntropyEnv, store, EngineConfig::default());
        let before = engine.store().snapshot();

        let err = engine.trigger(Some(&admin())).unwrap_err();
        assert_eq!(err.reason(), FailureReason::Internal);
        assert_eq!(engine.store().snapshot(), before);
    }
}
