//! Exclusion Graph Builder
//!
//! Turns raw conflict declarations into the canonical exclusion relation.
//!
//! ## Canonical form
//!
//! - Symmetric: if either side declares the other, both are excluded
//! - Irreflexive: self references are dropped (self-exclusion is implicit)
//! - Closed over the roster: ids that are not on the roster are dropped
//! - Deduplicated and ordered by id
//!
//! ## Design
//!
//! The builder allocates a fresh graph from the declarations and never touches
//! the declared input, so building twice from the same roster yields equal
//! graphs. Anything dropped or inferred is reported through
//! [`BuildDiagnostics`] rather than failing the build.

use std::collections::{BTreeMap, BTreeSet};

use crate::roster::{ParticipantId, RosterSnapshot};

/// Canonical symmetric, irreflexive exclusion relation over a roster.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExclusionGraph {
    excluded: BTreeMap<ParticipantId, BTreeSet<ParticipantId>>,
}

/// Everything the builder ignored or inferred while canonicalizing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildDiagnostics {
    /// `(declarer, unknown id)` pairs naming ids absent from the roster
    pub unknown: BTreeSet<(ParticipantId, ParticipantId)>,
    /// `(declarer, target)` pairs where the target did not declare back
    pub asymmetric: BTreeSet<(ParticipantId, ParticipantId)>,
    /// Participants that listed themselves
    pub self_references: BTreeSet<ParticipantId>,
}

impl BuildDiagnostics {
    /// Human-readable warnings, in deterministic order.
    ///
    /// Self references are not reported; they are implied anyway.
    pub fn warnings(&self) -> Vec<String> {
        let unknown = self.unknown.iter().map(|(declarer, target)| {
            format!("{declarer} lists unknown participant {target} as a conflict; ignored")
        });
        let asymmetric = self.asymmetric.iter().map(|(declarer, target)| {
            format!(
                "asymmetric conflict: {declarer} lists {target} but {target} does not list \
                 {declarer}; treated as mutual"
            )
        });
        unknown.chain(asymmetric).collect()
    }

    /// Whether nothing was dropped or inferred.
    pub fn is_clean(&self) -> bool {
        self.unknown.is_empty() && self.asymmetric.is_empty() && self.self_references.is_empty()
    }
}

impl ExclusionGraph {
    /// Build the canonical relation from a roster's declarations.
    pub fn build(roster: &RosterSnapshot) -> (Self, BuildDiagnostics) {
        let mut excluded: BTreeMap<ParticipantId, BTreeSet<ParticipantId>> =
            roster.ids().map(|id| (id.clone(), BTreeSet::new())).collect();
        let mut diagnostics = BuildDiagnostics::default();

        for participant in roster.participants() {
            let declarer = &participant.id;
            for target in &participant.conflicts {
                if target == declarer {
                    tracing::debug!("{} lists itself as a conflict; ignored", declarer);
                    diagnostics.self_references.insert(declarer.clone());
                    continue;
                }

                let Some(target_participant) = roster.get(target) else {
                    tracing::warn!("{} lists unknown participant {}; ignored", declarer, target);
                    diagnostics.unknown.insert((declarer.clone(), target.clone()));
                    continue;
                };

                if !target_participant.conflicts.contains(declarer) {
                    diagnostics.asymmetric.insert((declarer.clone(), target.clone()));
                }

                excluded.entry(declarer.clone()).or_default().insert(target.clone());
                excluded.entry(target.clone()).or_default().insert(declarer.clone());
            }
        }

        (Self { excluded }, diagnostics)
    }

    /// Whether `a` and `b` must not be paired in either direction.
    pub fn excludes(&self, a: &ParticipantId, b: &ParticipantId) -> bool {
        self.excluded.get(a).is_some_and(|set| set.contains(b))
    }

    /// Whether `giver` may give to `giftee`.
    pub fn allows(&self, giver: &ParticipantId, giftee: &ParticipantId) -> bool {
        giver != giftee && !self.excludes(giver, giftee)
    }

    /// Canonical exclusion set of a participant (empty for unknown ids).
    pub fn excluded(&self, id: &ParticipantId) -> impl Iterator<Item = &ParticipantId> {
        self.excluded.get(id).into_iter().flatten()
    }

    /// Size of a participant's canonical exclusion set.
    pub fn exclusion_count(&self, id: &ParticipantId) -> usize {
        self.excluded.get(id).map_or(0, BTreeSet::len)
    }

    /// Number of participants covered by the graph.
    pub fn len(&self) -> usize {
        self.excluded.len()
    }

    /// Whether the graph covers no participants.
    pub fn is_empty(&self) -> bool {
        self.excluded.is_empty()
    }

    /// Every unordered excluded pair, each reported once as `(lower, higher)`.
    pub fn pairs(&self) -> impl Iterator<Item = (&ParticipantId, &ParticipantId)> {
        self.excluded
            .iter()
            .flat_map(|(a, set)| set.iter().filter(move |b| a < *b).map(move |b| (a, b)))
    }

    /// A excludes B iff B excludes A.
    pub fn is_symmetric(&self) -> bool {
        self.excluded.iter().all(|(a, set)| set.iter().all(|b| self.excludes(b, a)))
    }

    /// No participant excludes itself.
    pub fn is_irreflexive(&self) -> bool {
        self.excluded.iter().all(|(a, set)| !set.contains(a))
    }
}
