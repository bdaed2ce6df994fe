//! Production Environment implementation using system clocks and RNG.
//!
//! This module provides `SystemEnv`, the production implementation of the
//! `Environment` trait that uses real clocks and OS randomness.

use std::time::Instant;

use chrono::{DateTime, Utc};
use mistletoe_core::{EntropyError, Environment};

/// Production environment using system clocks and OS randomness.
///
/// This implementation:
/// - Uses `std::time::Instant::now()` for elapsed time
/// - Uses `chrono::Utc::now()` for timestamps
/// - Uses `getrandom` for randomness
///
/// # Security
///
/// The RNG uses `getrandom` which provides OS-level cryptographic randomness,
/// so the shuffle that decides who gives to whom cannot be predicted from
/// earlier rounds. When the OS source fails, `try_random_bytes` reports it and
/// the resolver refuses to run.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        // Zeros are predictable. Anything that decides pairings must go
        // through `try_random_bytes`.
        if self.try_random_bytes(buffer).is_err() {
            buffer.fill(0);
        }
    }

    fn try_random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
        getrandom::fill(buffer).map_err(|e| {
            tracing::error!("getrandom failed: {}", e);
            EntropyError(e.to_string())
        })
    }
}
