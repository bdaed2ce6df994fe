//! Deterministic test harness for Mistletoe.
//!
//! Seeded implementations of the `Environment` and `Store` seams plus an
//! exhaustive oracle, so resolver and trigger behaviour can be replayed and
//! checked against ground truth.
//!
//! - [`SimEnv`]: seeded RNG and a virtual clock that only moves when told
//! - [`ChaoticStore`]: memory store that fails a seeded fraction of calls
//! - [`oracle`]: backtracking search over every assignment of a small roster

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod chaotic_store;
pub mod oracle;
mod sim_env;

pub use chaotic_store::ChaoticStore;
pub use sim_env::SimEnv;
