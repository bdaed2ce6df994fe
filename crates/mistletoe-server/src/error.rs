//! Trigger error types.

use chrono::{DateTime, Utc};
use mistletoe_core::{Infeasibility, ResolveError};
use thiserror::Error;

use crate::{report::FailureReason, storage::StoreError};

/// Errors a trigger can end with.
///
/// `Unauthorized` and `AlreadyLocked` are rejected before any write.
/// `Infeasible` and `Internal` leave the store exactly as it was, so a retry
/// after fixing the roster is always safe.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// Caller is missing or not an administrator.
    #[error("unauthorized: {reason}")]
    Unauthorized {
        /// Why the caller was rejected.
        reason: String,
    },

    /// The round has already run, or another trigger is committing.
    #[error("{}", describe_lock(.locked_at))]
    AlreadyLocked {
        /// When the round was locked; `None` while another commit is in flight.
        locked_at: Option<DateTime<Utc>>,
    },

    /// No valid assignment exists under the current conflicts.
    #[error("{0}")]
    Infeasible(Infeasibility),

    /// Unexpected fault: corrupt roster, store failure, exceeded deadline.
    #[error("pairing failed: {0}")]
    Internal(String),
}

fn describe_lock(locked_at: &Option<DateTime<Utc>>) -> String {
    match locked_at {
        Some(at) => format!("pairing already completed at {at}; cannot trigger again"),
        None => "pairing already in progress; cannot trigger again".to_string(),
    }
}

impl TriggerError {
    /// Machine-readable failure reason.
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::Unauthorized { .. } => FailureReason::Unauthorized,
            Self::AlreadyLocked { .. } => FailureReason::AlreadyLocked,
            Self::Infeasible(_) => FailureReason::Infeasible,
            Self::Internal(_) => FailureReason::Internal,
        }
    }

    /// Returns true if retrying unchanged may succeed.
    ///
    /// Infeasible rounds need the conflict list fixed first; locked rounds
    /// need an administrative reset.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    pub(crate) fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized { reason: reason.into() }
    }
}

impl From<StoreError> for TriggerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyLocked { locked_at } => {
                Self::AlreadyLocked { locked_at: Some(locked_at) }
            },
            StoreError::Contended => Self::AlreadyLocked { locked_at: None },
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ResolveError> for TriggerError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Infeasible(infeasibility) => Self::Infeasible(infeasibility),
            other @ (ResolveError::DeadlineExceeded { .. }
            | ResolveError::EntropyUnavailable(_)) => Self::Internal(other.to_string()),
        }
    }
}
