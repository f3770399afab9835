//! Per-pass statistics.

use serde::Serialize;

/// Counters for one reconciliation pass.
///
/// `processed` counts every fetched record, including ones that were
/// later skipped or failed; the other counters partition the outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub unpublished: usize,
    pub errors: usize,
}

impl SyncStats {
    /// Fold another pass's counters into this one, for grand totals
    /// across several table mappings.
    pub fn absorb(&mut self, other: &SyncStats) {
        self.processed += other.processed;
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.unpublished += other.unpublished;
        self.errors += other.errors;
    }

    /// Whether the pass finished without a single error.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.errors == 0
    }
}
