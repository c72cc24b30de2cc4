//! Run statistics
//!
//! Lock-free counters updated by item tasks, snapshotted into a
//! [`GatherSummary`] at the end of a run.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct GatherStats {
    admitted: AtomicUsize,
    completed: AtomicUsize,
    skipped: AtomicUsize,
    abandoned: AtomicUsize,
    unreachable: AtomicUsize,
    rejected_completed: AtomicUsize,
    rejected_skipped: AtomicUsize,
    fetches: AtomicUsize,
    retries: AtomicUsize,
}

macro_rules! counter {
    ($($inc:ident => $field:ident),* $(,)?) => {
        $(
            pub fn $inc(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl GatherStats {
    pub fn new() -> Self {
        Self::default()
    }

    counter! {
        record_admitted => admitted,
        record_completed => completed,
        record_skipped => skipped,
        record_abandoned => abandoned,
        record_unreachable => unreachable,
        record_rejected_completed => rejected_completed,
        record_rejected_skipped => rejected_skipped,
        record_fetch => fetches,
        record_retry => retries,
    }

    pub fn summary(&self, duplicates: usize, ledger_total: usize) -> GatherSummary {
        let load = |counter: &AtomicUsize| counter.load(Ordering::Relaxed);
        GatherSummary {
            admitted: load(&self.admitted),
            completed: load(&self.completed),
            skipped: load(&self.skipped),
            abandoned: load(&self.abandoned),
            unreachable: load(&self.unreachable),
            rejected_completed: load(&self.rejected_completed),
            rejected_skipped: load(&self.rejected_skipped),
            duplicates,
            fetches: load(&self.fetches),
            retries: load(&self.retries),
            ledger_total,
        }
    }
}

/// Counters for one gather run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GatherSummary {
    pub admitted: usize,
    /// Completed in this run
    pub completed: usize,
    pub skipped: usize,
    /// Includes unreachable items
    pub abandoned: usize,
    /// Abandoned because the availability check failed
    pub unreachable: usize,
    pub rejected_completed: usize,
    pub rejected_skipped: usize,
    /// Duplicate ids dropped by the work source
    pub duplicates: usize,
    pub fetches: usize,
    pub retries: usize,
    /// Ledger size after the run, prior runs included
    pub ledger_total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_snapshots_counters() {
        let stats = GatherStats::new();
        stats.record_admitted();
        stats.record_admitted();
        stats.record_completed();
        stats.record_fetch();
        stats.record_fetch();
        stats.record_fetch();

        let summary = stats.summary(4, 10);
        assert_eq!(summary.admitted, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.fetches, 3);
        assert_eq!(summary.duplicates, 4);
        assert_eq!(summary.ledger_total, 10);
        assert_eq!(summary.skipped, 0);
    }
}
