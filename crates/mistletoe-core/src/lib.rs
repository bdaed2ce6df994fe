//! Mistletoe pairing engine.
//!
//! Pure, I/O-free core of the gift exchange: given a roster snapshot and the
//! participants' declared conflicts, compute who gives to whom.
//!
//! ## Architecture
//!
//! ```text
//! mistletoe-core
//!   ├─ Environment        (time + randomness, injected)
//!   ├─ RosterSnapshot     (immutable participant view)
//!   ├─ ExclusionGraph     (canonical symmetric exclusions)
//!   └─ Resolver           (randomized phase → exact matching)
//! ```
//!
//! Persistence, locking and authorization live in `mistletoe-server`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
pub mod exclusion;
mod matching;
pub mod resolver;
pub mod roster;

pub use env::{EntropyError, Environment};
pub use exclusion::{BuildDiagnostics, ExclusionGraph};
pub use resolver::{
    Assignment, AssignmentViolation, Infeasibility, MIN_PARTICIPANTS, Phase, Resolution,
    ResolveError, Resolver, ResolverConfig,
};
pub use roster::{Participant, ParticipantId, RosterError, RosterSnapshot};
