//! Engine configuration.

use mistletoe_core::ResolverConfig;

/// Configuration for a [`PairingEngine`](crate::PairingEngine).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Resolver tuning (attempt budget, exact-phase deadline, warning threshold)
    pub resolver: ResolverConfig,
    /// When set, trigger callers must authenticate with an email in this domain
    pub admin_email_domain: Option<String>,
}
