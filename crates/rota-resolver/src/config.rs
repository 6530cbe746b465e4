//! Resolver and applier configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the conflict resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Rank substitutes by how little they already work in the window
    /// before roster order. When false, roster order alone decides.
    pub balance_load: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { balance_load: true }
    }
}

/// Configuration for the mutation applier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplierConfig {
    /// How many times a stale edit set is re-derived before giving up.
    pub max_retries: u32,
}

impl Default for ApplierConfig {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}
