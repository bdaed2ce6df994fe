//! Fuzz target for the exclusion graph builder and resolver
//!
//! Arbitrary rosters with arbitrary (often dangling, self-referential or
//! one-sided) conflict lists must never panic and never yield an invalid
//! assignment.
//!
//! # Strategy
//!
//! - Roster shape: small id alphabet so duplicates and collisions are common
//! - Conflict lists: indices into the same alphabet, including unknown ids
//! - Budgets: zero random attempts forces the exact phase
//!
//! # Invariants
//!
//! - Canonical exclusions are symmetric and irreflexive
//! - Building from the canonical output is a fixed point
//! - Any `Ok` assignment passes `verify`
//! - Fewer than two participants is always `TooFewParticipants`
//! - NEVER panic on malformed rosters

#![no_main]

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use arbitrary::Arbitrary;
use chrono::{DateTime, Utc};
use libfuzzer_sys::fuzz_target;
use mistletoe_core::{
    Environment, ExclusionGraph, Infeasibility, Participant, ResolveError, Resolver,
    ResolverConfig, RosterSnapshot,
};

/// Deterministic entropy from the fuzz input; time never moves.
#[derive(Clone)]
struct FuzzEnv {
    origin: Instant,
    counter: Arc<AtomicU64>,
}

impl Environment for FuzzEnv {
    fn now(&self) -> Instant {
        self.origin
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        DateTime::UNIX_EPOCH
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        for chunk in buffer.chunks_mut(8) {
            let next = self.counter.fetch_add(0x9E37_79B9_7F4A_7C15, Ordering::Relaxed);
            chunk.copy_from_slice(&next.to_le_bytes()[..chunk.len()]);
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct FuzzParticipant {
    id: u8,
    conflicts: Vec<u8>,
}

#[derive(Debug, Clone, Arbitrary)]
struct FuzzInput {
    seed: u64,
    random_attempts: u8,
    participants: Vec<FuzzParticipant>,
}

fn id(raw: u8) -> String {
    format!("p{}", raw % 24)
}

fuzz_target!(|input: FuzzInput| {
    let participants: Vec<Participant> = input
        .participants
        .iter()
        .take(24)
        .map(|p| {
            Participant::new(id(p.id), "fuzz").with_conflicts(p.conflicts.iter().map(|&c| id(c)))
        })
        .collect();

    // Duplicate ids are rejected up front, never passed on.
    let Ok(roster) = RosterSnapshot::new(participants) else {
        return;
    };

    let (graph, _) = ExclusionGraph::build(&roster);
    assert!(graph.is_symmetric(), "canonical exclusions must be symmetric");
    assert!(graph.is_irreflexive(), "canonical exclusions must be irreflexive");

    let canonical: Vec<Participant> = roster
        .ids()
        .map(|id| Participant::new(id.clone(), "fuzz").with_conflicts(graph.excluded(id).cloned()))
        .collect();
    let canonical_roster = RosterSnapshot::new(canonical).expect("canonical ids are unique");
    let (rebuilt, diagnostics) = ExclusionGraph::build(&canonical_roster);
    assert_eq!(rebuilt, graph, "rebuilding canonical exclusions must be a fixed point");
    assert!(diagnostics.is_clean());

    let env = FuzzEnv { origin: Instant::now(), counter: Arc::new(AtomicU64::new(input.seed)) };
    let config = ResolverConfig {
        random_attempts: u32::from(input.random_attempts),
        exact_phase_deadline: Duration::from_secs(60),
        ..ResolverConfig::default()
    };

    match Resolver::new(env, config).resolve(&roster, &graph) {
        Ok(resolution) => {
            assert_eq!(resolution.assignment.len(), roster.len());
            if let Err(violation) = resolution.assignment.verify(&roster, &graph) {
                panic!("resolver produced an invalid assignment: {violation}");
            }
        },
        Err(ResolveError::Infeasible(Infeasibility::TooFewParticipants { count })) => {
            assert!(count < 2);
        },
        Err(ResolveError::Infeasible(reason)) => {
            assert!(roster.len() >= 2);
            assert!(!reason.participants().is_empty());
        },
        Err(e @ ResolveError::DeadlineExceeded { .. }) => {
            panic!("frozen clock cannot exceed the deadline: {e}");
        },
        Err(e @ ResolveError::EntropyUnavailable(_)) => {
            panic!("counter entropy cannot fail: {e}");
        },
    }
});
