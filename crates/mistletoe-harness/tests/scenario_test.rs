//! End-to-end trigger scenarios.
//!
//! Each scenario runs through the full engine (authorize, lock pre-check,
//! resolve, commit, report) against a seeded environment.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use mistletoe_core::ParticipantId;
use mistletoe_harness::{ChaoticStore, SimEnv};
use mistletoe_server::{
    Caller, EngineConfig, FailureReason, FailureReport, MemoryStore, PairingEngine, Store,
    TriggerError, UserRecord,
};

fn admin() -> Caller {
    Caller::new("admin@example.org")
}

fn engine(seed: u64, users: Vec<UserRecord>) -> PairingEngine<SimEnv, MemoryStore> {
    let mut all = vec![UserRecord::admin("admin", "Admin")];
    all.extend(users);
    let env = SimEnv::with_seed(seed)
        .with_wall_origin(Utc.with_ymd_and_hms(2025, 12, 1, 9, 30, 0).unwrap());
    PairingEngine::new(env, MemoryStore::with_users(all), EngineConfig::default())
}

fn giftees(store: &impl Store) -> BTreeMap<ParticipantId, Option<ParticipantId>> {
    store
        .load_participants()
        .expect("load participants")
        .into_iter()
        .map(|u| (u.id, u.giftee_id))
        .collect()
}

#[test]
fn scenario_a_three_without_conflicts() {
    for seed in 0..32 {
        let engine = engine(seed, vec![
            UserRecord::participant("alice", "Alice"),
            UserRecord::participant("bob", "Bob"),
            UserRecord::participant("carol", "Carol"),
        ]);

        let report = engine.trigger(Some(&admin())).expect("scenario A succeeds");
        assert_eq!(report.pairings_count, 3);
        assert_eq!(report.timestamp, "2025-12-01T09:30:00.000Z");

        // Any derangement of three is a single 3-cycle.
        let assigned = giftees(engine.store());
        let mut received: Vec<_> = assigned.values().flatten().cloned().collect();
        received.sort();
        assert_eq!(received, assigned.keys().cloned().collect::<Vec<_>>());
        for (giver, giftee) in &assigned {
            assert_ne!(Some(giver), giftee.as_ref());
        }
    }
}

#[test]
fn scenario_b_two_mutually_excluded() {
    let engine = engine(1, vec![
        UserRecord::participant("alice", "Alice").with_conflicts(["bob"]),
        UserRecord::participant("bob", "Bob"),
    ]);
    let before = engine.store().snapshot();

    let err = engine.trigger(Some(&admin())).unwrap_err();
    assert!(matches!(err, TriggerError::Infeasible(_)));

    let report = FailureReport::from(&err);
    assert_eq!(report.reason, FailureReason::Infeasible);
    assert!(!report.participants.is_empty());
    assert_eq!(engine.store().snapshot(), before, "infeasible round writes nothing");
}

#[test]
fn scenario_c_mutual_pair_among_four() {
    let alice = ParticipantId::from("alice");
    let bob = ParticipantId::from("bob");

    for seed in 0..32 {
        let engine = engine(seed, vec![
            UserRecord::participant("alice", "Alice").with_conflicts(["bob"]),
            UserRecord::participant("bob", "Bob").with_conflicts(["alice"]),
            UserRecord::participant("carol", "Carol"),
            UserRecord::participant("dave", "Dave"),
        ]);

        let report = engine.trigger(Some(&admin())).expect("scenario C succeeds");
        assert_eq!(report.pairings_count, 4);
        assert!(report.warnings.is_empty(), "mutual declaration is not asymmetric");

        let assigned = giftees(engine.store());
        assert_ne!(assigned[&alice].as_ref(), Some(&bob));
        assert_ne!(assigned[&bob].as_ref(), Some(&alice));
    }
}

#[test]
fn scenario_d_second_trigger_keeps_first_assignment() {
    let engine = engine(4, vec![
        UserRecord::participant("alice", "Alice"),
        UserRecord::participant("bob", "Bob"),
        UserRecord::participant("carol", "Carol"),
        UserRecord::participant("dave", "Dave"),
    ]);

    engine.trigger(Some(&admin())).expect("first trigger succeeds");
    let first = giftees(engine.store());
    let locked = engine.store().load_round_state().expect("round state");

    let err = engine.trigger(Some(&admin())).unwrap_err();
    assert_eq!(err.reason(), FailureReason::AlreadyLocked);
    assert!(err.to_string().contains("cannot trigger again"));

    assert_eq!(giftees(engine.store()), first);
    assert_eq!(engine.store().load_round_state().expect("round state"), locked);
}

#[test]
fn large_exclusion_set_is_reported() {
    let engine = engine(8, vec![
        UserRecord::participant("alice", "Alice").with_conflicts(["bob", "carol", "dave", "erin"]),
        UserRecord::participant("bob", "Bob"),
        UserRecord::participant("carol", "Carol"),
        UserRecord::participant("dave", "Dave"),
        UserRecord::participant("erin", "Erin"),
        UserRecord::participant("frank", "Frank"),
    ]);

    let report = engine.trigger(Some(&admin())).expect("feasible with warnings");
    assert_eq!(report.pairings_count, 6);
    assert!(report.warnings.iter().any(|w| w.starts_with("alice excludes 4 of 6")));
}

#[test]
fn admin_domain_is_enforced() {
    let users = vec![
        UserRecord::admin("admin", "Admin"),
        UserRecord::participant("alice", "Alice"),
        UserRecord::participant("bob", "Bob"),
    ];
    let config =
        EngineConfig { admin_email_domain: Some("example.org".into()), ..EngineConfig::default() };
    let engine = PairingEngine::new(SimEnv::with_seed(2), MemoryStore::with_users(users), config);

    let err = engine.trigger(Some(&Caller::new("admin@elsewhere.net"))).unwrap_err();
    assert_eq!(err.reason(), FailureReason::Unauthorized);

    engine.trigger(Some(&Caller::new("admin@Example.org"))).expect("matching domain");
}

#[test]
fn injected_commit_faults_never_leave_partial_writes() {
    let users = vec![
        UserRecord::admin("admin", "Admin"),
        UserRecord::participant("alice", "Alice").with_conflicts(["bob"]),
        UserRecord::participant("bob", "Bob"),
        UserRecord::participant("carol", "Carol"),
        UserRecord::participant("dave", "Dave"),
        UserRecord::participant("erin", "Erin"),
    ];

    for seed in 0..16 {
        let store = ChaoticStore::new(MemoryStore::with_users(users.clone()), seed)
            .with_commit_failure_rate(0.5);
        let engine = PairingEngine::new(SimEnv::with_seed(seed), store, EngineConfig::default());

        let mut succeeded = false;
        for _ in 0..32 {
            let before = engine.store().inner().snapshot();
            match engine.trigger(Some(&admin())) {
                Ok(report) => {
                    assert_eq!(report.pairings_count, 5);
                    succeeded = true;
                    break;
                },
                Err(e) => {
                    assert_eq!(e.reason(), FailureReason::Internal);
                    assert!(e.is_retryable());
                    assert_eq!(engine.store().inner().snapshot(), before, "failed commit wrote");
                },
            }
        }

        assert!(succeeded, "seed {seed}: retries should eventually commit");
        let state = engine.store().load_round_state().expect("round state");
        assert!(state.is_locked());
        assert!(giftees(engine.store()).values().all(Option::is_some));
    }
}

#[test]
fn injected_load_faults_surface_as_internal() {
    let users = vec![
        UserRecord::admin("admin", "Admin"),
        UserRecord::participant("alice", "Alice"),
        UserRecord::participant("bob", "Bob"),
    ];
    let store = ChaoticStore::new(MemoryStore::with_users(users), 3).with_load_failure_rate(1.0);
    let engine = PairingEngine::new(SimEnv::with_seed(3), store, EngineConfig::default());

    let err = engine.trigger(Some(&admin())).unwrap_err();
    assert_eq!(err.reason(), FailureReason::Internal);
    assert!(engine.store().injected() > 0);
    assert!(!engine.store().inner().load_round_state().expect("round state").is_locked());
}
