//! Mistletoe trigger service.
//!
//! This crate wraps the pure pairing engine with everything a round needs to
//! run exactly once:
//! - Caller authorization
//! - Round lock (compare-and-swap against the store)
//! - Roster and round-state persistence
//! - Result reporting
//!
//! ## Architecture
//!
//! ```text
//! mistletoe-server
//!   ├─ SystemEnv          (production Environment impl)
//!   ├─ PairingEngine      (trigger orchestration)
//!   ├─ RoundLock          (one-shot test-and-set)
//!   ├─ Store              (MemoryStore, FileStore)
//!   └─ PairingReport      (success / failure shapes)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod config;
mod engine;
mod error;
pub mod report;
mod round;
mod round_lock;
pub mod storage;
mod system_env;

pub use auth::Caller;
pub use config::EngineConfig;
pub use engine::PairingEngine;
pub use error::TriggerError;
pub use report::{FailureReason, FailureReport, PairingReport};
pub use round::{RoundCommit, RoundMetadata, RoundState};
pub use round_lock::RoundLock;
pub use storage::{FileStore, MemoryStore, Store, StoreDocument, StoreError, UserRecord};
pub use system_env::SystemEnv;
