//! Roster snapshot.
//!
//! An immutable view of the participants taking part in a round, captured
//! once before resolution. Later edits to the backing store never reach an
//! in-flight resolution because the snapshot owns its data.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

/// Unique participant identifier (the user document id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create an identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A participant as declared by roster management.
///
/// `conflicts` is the raw declaration: it may be asymmetric, contain
/// duplicates, name the participant itself, or name ids that are not on the
/// roster. The exclusion graph builder canonicalizes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Participant identifier
    pub id: ParticipantId,
    /// Display name
    pub name: String,
    /// Declared exclusions
    #[serde(default)]
    pub conflicts: Vec<ParticipantId>,
}

impl Participant {
    /// Create a participant with no declared conflicts.
    pub fn new(id: impl Into<ParticipantId>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), conflicts: Vec::new() }
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
}

/// Errors raised while capturing a roster snapshot.
///
/// These indicate corrupt roster data, not an infeasible configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    /// A participant record has an empty id
    #[error("participant with empty id")]
    EmptyId,

    /// The same id appears on two participant records
    #[error("duplicate participant: {0}")]
    DuplicateParticipant(ParticipantId),
}

/// Immutable roster captured at the instant the engine runs.
///
/// Participants are ordered by id so that every deterministic step (the
/// exact matching phase, warning order) is independent of store iteration
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterSnapshot {
    participants: Vec<Participant>,
}

impl RosterSnapshot {
    /// Capture a snapshot, validating ids.
    ///
    /// # Errors
    ///
    /// Returns `RosterError::EmptyId` for a blank id and
    /// `RosterError::DuplicateParticipant` when an id repeats.
    pub fn new(mut participants: Vec<Participant>) -> Result<Self, RosterError> {
        let mut seen = BTreeSet::new();
        for participant in &participants {
            if participant.id.as_str().trim().is_empty() {
                return Err(RosterError::EmptyId);
            }
            if !seen.insert(participant.id.clone()) {
                return Err(RosterError::DuplicateParticipant(participant.id.clone()));
            }
        }

        participants.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(Self { participants })
    }

    /// Number of participants.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Participants in id order.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Participant ids in id order.
    pub fn ids(&self) -> impl Iterator<Item = &ParticipantId> {
        self.participants.iter().map(|p| &p.id)
    }

    /// Position of a participant in id order.
    pub fn index_of(&self, id: &ParticipantId) -> Option<usize> {
        self.participants.binary_search_by(|p| p.id.cmp(id)).ok()
    }

    /// Whether the id is on the roster.
    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.index_of(id).is_some()
    }

    /// Look up a participant by id.
    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.index_of(id).map(|i| &self.participants[i])
    }
}
