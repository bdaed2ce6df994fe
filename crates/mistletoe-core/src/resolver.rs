//! Assignment Resolver
//!
//! Computes a complete assignment (every participant gives once, receives
//! once, never to themselves, never across an exclusion) or proves that none
//! exists.
//!
//! ## Phases
//!
//! 1. Feasibility pre-checks: too few participants, or a participant whose
//!    exclusions cover everyone else. These fail before any search.
//! 2. Randomized: shuffle the roster into a candidate permutation and test it,
//!    up to [`ResolverConfig::random_attempts`] times. Succeeds quickly when
//!    exclusions are sparse.
//! 3. Exact: maximum bipartite matching over the allowed edges. A perfect
//!    matching is the assignment; anything smaller is a proof of
//!    infeasibility, reported with the participants that cannot be served.
//!
//! The randomized phase is intentionally unpredictable across runs. The exact
//! phase is deterministic for a given roster.

use std::{collections::BTreeMap, fmt, time::Duration};

use rand::{SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha8Rng;

use crate::{
    env::{EntropyError, Environment},
    exclusion::ExclusionGraph,
    matching::{self, CandidateGraph},
    roster::{ParticipantId, RosterSnapshot},
};

/// Smallest roster that admits an assignment.
pub const MIN_PARTICIPANTS: usize = 2;

/// Resolver tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Shuffles to try before falling back to exact matching.
    pub random_attempts: u32,
    /// Wall budget for the exact phase.
    pub exact_phase_deadline: Duration,
    /// Warn when a participant excludes strictly more than this percentage of
    /// the roster.
    pub large_exclusion_percent: u8,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            random_attempts: 1000,
            exact_phase_deadline: Duration::from_secs(5),
            large_exclusion_percent: 50,
        }
    }
}

/// Complete giver → giftee mapping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assignment {
    pairs: BTreeMap<ParticipantId, ParticipantId>,
}

/// Ways an assignment can break its invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssignmentViolation {
    /// A roster member gives to nobody
    #[error("{0} has no giftee")]
    MissingGiver(ParticipantId),

    /// A giver or giftee is not on the roster
    #[error("{0} is not on the roster")]
    UnknownParticipant(ParticipantId),

    /// A participant gives to themselves
    #[error("self-assignment detected: {0}")]
    SelfAssigned(ParticipantId),

    /// A participant receives more than once
    #[error("{0} receives more than one gift")]
    DuplicateGiftee(ParticipantId),

    /// An excluded pair was matched
    #[error("{giver} may not give to {giftee}")]
    Excluded {
        /// Giver side of the pair
        giver: ParticipantId,
        /// Giftee side of the pair
        giftee: ParticipantId,
    },
}

impl Assignment {
    /// Giftee for a giver.
    pub fn giftee_of(&self, giver: &ParticipantId) -> Option<&ParticipantId> {
        self.pairs.get(giver)
    }

    /// Number of pairings.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no pairing was made.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pairings in giver id order.
    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantId, &ParticipantId)> {
        self.pairs.iter()
    }

    /// Check bijection, no fixed points, and exclusions against a roster.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn verify(
        &self,
        roster: &RosterSnapshot,
        graph: &ExclusionGraph,
    ) -> Result<(), AssignmentViolation> {
        for id in roster.ids() {
            if !self.pairs.contains_key(id) {
                return Err(AssignmentViolation::MissingGiver(id.clone()));
            }
        }

        let mut received = std::collections::BTreeSet::new();
        for (giver, giftee) in &self.pairs {
            for id in [giver, giftee] {
                if !roster.contains(id) {
                    return Err(AssignmentViolation::UnknownParticipant(id.clone()));
                }
            }
            if giver == giftee {
                return Err(AssignmentViolation::SelfAssigned(giver.clone()));
            }
            if graph.excludes(giver, giftee) {
                return Err(AssignmentViolation::Excluded {
                    giver: giver.clone(),
                    giftee: giftee.clone(),
                });
            }
            if !received.insert(giftee) {
                return Err(AssignmentViolation::DuplicateGiftee(giftee.clone()));
            }
        }

        Ok(())
    }
}

impl FromIterator<(ParticipantId, ParticipantId)> for Assignment {
    fn from_iter<I: IntoIterator<Item = (ParticipantId, ParticipantId)>>(iter: I) -> Self {
        Self { pairs: iter.into_iter().collect() }
    }
}

/// Why no valid assignment exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Infeasibility {
    /// Fewer than [`MIN_PARTICIPANTS`] participants
    TooFewParticipants {
        /// Roster size
        count: usize,
    },

    /// Participants with no allowed giftee at all
    FullyConflicted {
        /// The participants, in id order
        participants: Vec<ParticipantId>,
    },

    /// Some givers compete for a strictly smaller set of giftees
    NoPerfectMatching {
        /// Givers that cannot all be served
        constrained: Vec<ParticipantId>,
        /// Every giftee those givers are allowed to give to
        available: Vec<ParticipantId>,
    },
}

impl Infeasibility {
    /// Participants the administrator should look at.
    pub fn participants(&self) -> &[ParticipantId] {
        match self {
            Self::TooFewParticipants { .. } => &[],
            Self::FullyConflicted { participants } => participants,
            Self::NoPerfectMatching { constrained, .. } => constrained,
        }
    }
}

fn join(ids: &[ParticipantId]) -> String {
    ids.iter().map(ParticipantId::as_str).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for Infeasibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewParticipants { count } => write!(
                f,
                "insufficient participants for pairing: need at least {MIN_PARTICIPANTS}, found \
                 {count}"
            ),
            Self::FullyConflicted { participants } => write!(
                f,
                "Unable to generate valid pairings: {} conflicted with all other participants",
                join(participants)
            ),
            Self::NoPerfectMatching { constrained, available } => write!(
                f,
                "Unable to generate valid pairings: conflicts leave {} giver(s) ({}) with only \
                 {} possible giftee(s) ({})",
                constrained.len(),
                join(constrained),
                available.len(),
                join(available)
            ),
        }
    }
}

/// Errors from resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// No valid assignment exists under the current exclusions
    #[error("{0}")]
    Infeasible(Infeasibility),

    /// The exact phase ran out of time
    #[error("exact matching exceeded its deadline: {elapsed:?} > {limit:?}")]
    DeadlineExceeded {
        /// Time spent when the search gave up
        elapsed: Duration,
        /// Configured budget
        limit: Duration,
    },

    /// No seed could be drawn for the randomized phase
    #[error("{0}")]
    EntropyUnavailable(#[from] EntropyError),
}

/// Which phase produced the assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// A random shuffle passed on this attempt (1-based)
    Randomized {
        /// Attempt number
        attempt: u32,
    },
    /// Exact matching after the randomized budget ran out
    Exact,
}

/// Successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The computed assignment
    pub assignment: Assignment,
    /// Non-fatal warnings about the roster
    pub warnings: Vec<String>,
    /// Phase that found the assignment
    pub phase: Phase,
}

/// Two-phase assignment resolver.
#[derive(Debug, Clone)]
pub struct Resolver<E>
where
    E: Environment,
{
    env: E,
    config: ResolverConfig,
}

impl<E> Resolver<E>
where
    E: Environment,
{
    /// Create a resolver.
    pub fn new(env: E, config: ResolverConfig) -> Self {
        Self { env, config }
    }

    /// Resolver configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve an assignment for the roster under the canonical exclusions.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::Infeasible` when no assignment exists,
    /// `ResolveError::DeadlineExceeded` when the exact phase runs out of time,
    /// and `ResolveError::EntropyUnavailable` when the shuffle cannot be
    /// seeded. A zeroed seed would make the pairing guessable.
    pub fn resolve(
        &self,
        roster: &RosterSnapshot,
        graph: &ExclusionGraph,
    ) -> Result<Resolution, ResolveError> {
        let n = roster.len();
        if n < MIN_PARTICIPANTS {
            return Err(ResolveError::Infeasible(Infeasibility::TooFewParticipants { count: n }));
        }

        let candidates = candidate_graph(roster, graph);
        let ids: Vec<&ParticipantId> = roster.ids().collect();

        let stranded: Vec<ParticipantId> =
            (0..n).filter(|&i| candidates.degree(i) == 0).map(|i| ids[i].clone()).collect();
        if !stranded.is_empty() {
            return Err(ResolveError::Infeasible(Infeasibility::FullyConflicted {
                participants: stranded,
            }));
        }

        let warnings = self.large_exclusion_warnings(roster, graph);
        let seed = self.env.try_rng_seed()?;

        if let Some((giftees, attempt)) = self.randomized(&candidates, seed) {
            tracing::debug!("randomized phase succeeded on attempt {}", attempt);
            return Ok(Resolution {
                assignment: to_assignment(&ids, &giftees),
                warnings,
                phase: Phase::Randomized { attempt },
            });
        }

        tracing::debug!(
            "randomized phase exhausted {} attempts; falling back to exact matching",
            self.config.random_attempts
        );
        let giftees = self.exact(&candidates, &ids)?;
        Ok(Resolution { assignment: to_assignment(&ids, &giftees), warnings, phase: Phase::Exact })
    }

    fn randomized(&self, candidates: &CandidateGraph, seed: [u8; 32]) -> Option<(Vec<usize>, u32)> {
        let mut rng = ChaCha8Rng::from_seed(seed);
        let mut giftees: Vec<usize> = (0..candidates.len()).collect();

        for attempt in 1..=self.config.random_attempts {
            giftees.shuffle(&mut rng);
            if candidates.accepts(&giftees) {
                return Some((giftees, attempt));
            }
        }

        None
    }

    fn exact(
        &self,
        candidates: &CandidateGraph,
        ids: &[&ParticipantId],
    ) -> Result<Vec<usize>, ResolveError> {
        let started = self.env.now();
        let limit = self.config.exact_phase_deadline;

        let result = matching::maximum_matching(candidates, || {
            self.env.now().saturating_duration_since(started) <= limit
        });
        let Ok(matched) = result else {
            let elapsed = self.env.now().saturating_duration_since(started);
            return Err(ResolveError::DeadlineExceeded { elapsed, limit });
        };

        if matched.is_perfect() {
            return Ok(matched.giftee_of.iter().flatten().copied().collect());
        }

        let (constrained, available) = matching::hall_violator(candidates, &matched);
        let name = |indices: Vec<usize>| -> Vec<ParticipantId> {
            indices.into_iter().map(|i| ids[i].clone()).collect()
        };
        Err(ResolveError::Infeasible(Infeasibility::NoPerfectMatching {
            constrained: name(constrained),
            available: name(available),
        }))
    }

    fn large_exclusion_warnings(
        &self,
        roster: &RosterSnapshot,
        graph: &ExclusionGraph,
    ) -> Vec<String> {
        let n = roster.len();
        let percent = usize::from(self.config.large_exclusion_percent);

        roster
            .ids()
            .filter_map(|id| {
                let count = graph.exclusion_count(id);
                (count * 100 > n * percent).then(|| {
                    tracing::warn!("{} excludes {} of {} participants", id, count, n);
                    format!(
                        "{id} excludes {count} of {n} participants; future rounds may become \
                         infeasible"
                    )
                })
            })
            .collect()
    }
}

fn candidate_graph(roster: &RosterSnapshot, graph: &ExclusionGraph) -> CandidateGraph {
    CandidateGraph::new(
        roster
            .ids()
            .map(|id| {
                let mut excluded: Vec<usize> =
                    graph.excluded(id).filter_map(|other| roster.index_of(other)).collect();
                excluded.sort_unstable();
                excluded
            })
            .collect(),
    )
}

fn to_assignment(ids: &[&ParticipantId], giftees: &[usize]) -> Assignment {
    giftees
        .iter()
        .enumerate()
        .map(|(giver, &giftee)| (ids[giver].clone(), ids[giftee].clone()))
        .collect()
}
