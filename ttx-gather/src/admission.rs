//! Admission control
//!
//! Decides whether a candidate may start processing. The completed count is
//! the ledger's, so it includes earlier runs. The budget caps how many items
//! get newly admitted, not how many finish: items already in flight when
//! the budget is reached still run to the end.

use crate::ledger::Ledger;
use crate::skip_log::SkipLog;
use std::sync::Arc;
use ttx_common::config::CompletionBudget;
use ttx_common::{FacetSet, ItemId};

/// Admission decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected(RejectReason),
    /// Budget reached; stop admitting for this run
    Deferred { completed: usize },
}

/// Why a candidate will not be processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    AlreadyCompleted,
    PreviouslySkipped,
}

pub struct AdmissionController {
    ledger: Arc<Ledger>,
    skip_log: Option<Arc<SkipLog>>,
    required: FacetSet,
    budget: CompletionBudget,
}

impl AdmissionController {
    /// `skip_log` is `None` when earlier skip decisions should be rechecked
    pub fn new(
        ledger: Arc<Ledger>,
        skip_log: Option<Arc<SkipLog>>,
        required: FacetSet,
        budget: CompletionBudget,
    ) -> Self {
        Self {
            ledger,
            skip_log,
            required,
            budget,
        }
    }

    pub async fn try_admit(&self, id: &ItemId) -> Admission {
        let status = self.ledger.status_of(id).await;
        if status.completed {
            return Admission::Rejected(RejectReason::AlreadyCompleted);
        }

        if let Some(skip_log) = &self.skip_log {
            if skip_log.still_skipped(id, &self.required).await {
                return Admission::Rejected(RejectReason::PreviouslySkipped);
            }
        }

        if !self.budget.allows(status.total) {
            return Admission::Deferred {
                completed: status.total,
            };
        }

        Admission::Admitted
    }
}
