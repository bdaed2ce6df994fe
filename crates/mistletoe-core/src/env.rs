//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples pairing logic from system resources
//! (clocks and entropy). This enables:
//!
//! - Deterministic Simulation: a seeded RNG and a virtual clock reproduce the
//!   exact shuffle sequence and deadline behaviour of a failing run.
//!
//! - Production Runtime: the system implementation uses the OS entropy pool
//!   and real clocks without any change to the resolver.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use std::time::Instant;

use chrono::{DateTime, Utc};

/// Abstract environment providing time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// 1. Time monotonicity: `now()` never goes backwards
/// 2. RNG quality: `random_bytes()` uses unpredictable entropy in production.
///    Pairings are secret, so a guessable shuffle leaks who gives to whom.
/// 3. Minimal panics: Methods are infallible
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current monotonic time.
    ///
    /// Used only for measuring elapsed time (exact-phase deadline).
    fn now(&self) -> Instant;

    /// Returns the current wall-clock time.
    ///
    /// Used for lock timestamps and reports. Not required to be monotonic.
    fn wall_clock(&self) -> DateTime<Utc>;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Determinism during simulations: Given the same RNG seed, this produces
    ///   the same sequence of bytes
    /// - Unpredictability in production: Uses the OS entropy pool
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Fills the provided buffer with random bytes, or reports that the
    /// entropy source failed.
    ///
    /// Implementations backed by a source that can fail must override this.
    /// Callers that need unpredictable output use this instead of
    /// `random_bytes`.
    fn try_random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
        self.random_bytes(buffer);
        Ok(())
    }

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a 256-bit seed for a local RNG.
    ///
    /// The resolver seeds one ChaCha stream per resolution from this value so
    /// that shuffling never calls back into the environment per swap.
    fn rng_seed(&self) -> [u8; 32] {
        let mut seed = [0u8; 32];
        self.random_bytes(&mut seed);
        seed
    }

    /// Generates a 256-bit seed, failing if the entropy source failed.
    fn try_rng_seed(&self) -> Result<[u8; 32], EntropyError> {
        let mut seed = [0u8; 32];
        self.try_random_bytes(&mut seed)?;
        Ok(seed)
    }
}

/// The entropy source could not produce bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("entropy source unavailable: {0}")]
pub struct EntropyError(pub String);
