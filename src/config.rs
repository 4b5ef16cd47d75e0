// src/config.rs
use std::time::Duration;

/// Runtime knobs for the ledger service. Constructed explicitly at startup
/// and handed to `Ledger::new`; the crate keeps no ambient state.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// How many times a plan is re-executed after a storage write conflict.
    /// Conflicts are expected under contention; business rejections are
    /// never retried.
    pub max_conflict_retries: u32,
    /// Backoff step between conflict retries; attempt n sleeps n * this.
    pub conflict_backoff: Duration,
    /// Upper bound on transaction-listing page size.
    pub max_page_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            conflict_backoff: Duration::from_millis(25),
            max_page_size: 100,
        }
    }
}
