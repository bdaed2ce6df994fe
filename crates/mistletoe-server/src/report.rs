//! Result Reporter
//!
//! Stable, serializable shapes returned to the trigger caller. A caller can
//! tell "succeeded with N pairings" from every failure kind by looking at the
//! shape alone.
//!
//! ```text
//! success: { "pairingsCount": 3, "timestamp": "2025-12-01T09:30:00.000Z", "warnings": [] }
//! failure: { "reason": "infeasible", "message": "...", "participants": ["alice"] }
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::TriggerError, round::RoundMetadata};

/// Successful trigger outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingReport {
    /// Number of pairings made
    pub pairings_count: usize,
    /// Completion time, ISO-8601
    pub timestamp: String,
    /// Non-fatal warnings (possibly empty)
    pub warnings: Vec<String>,
}

impl PairingReport {
    /// Build the report for a committed round.
    pub fn from_metadata(metadata: &RoundMetadata) -> Self {
        Self {
            pairings_count: metadata.pairings_count,
            timestamp: format_timestamp(metadata.completed_at),
            warnings: metadata.warnings.clone(),
        }
    }
}

/// Machine-readable failure reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    /// Caller lacks administrator capability
    Unauthorized,
    /// The round has already run
    AlreadyLocked,
    /// Conflicts make every assignment impossible
    Infeasible,
    /// Unexpected fault
    Internal,
}

impl FailureReason {
    /// Wire name of the reason.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::AlreadyLocked => "already-locked",
            Self::Infeasible => "infeasible",
            Self::Internal => "internal",
        }
    }
}

/// Failed trigger outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    /// Failure kind
    pub reason: FailureReason,
    /// Human-readable explanation
    pub message: String,
    /// Participants implicated in an infeasible round
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<String>,
}

impl From<&TriggerError> for FailureReport {
    fn from(err: &TriggerError) -> Self {
        let participants = match err {
            TriggerError::Infeasible(infeasibility) => {
                infeasibility.participants().iter().map(ToString::to_string).collect()
            },
            _ => Vec::new(),
        };
        Self { reason: err.reason(), message: err.to_string(), participants }
    }
}

/// ISO-8601 / RFC 3339 timestamp with millisecond precision in UTC.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
