//! Finalizer: turns a complete accumulator into one ledger line

use crate::coordinator::Accumulator;
use crate::item::Item;
use crate::ledger::{AppendOutcome, Ledger};
use crate::remote::TalkPage;
use crate::stats::GatherStats;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use ttx_common::events::{EventBus, GatherEvent};
use ttx_common::{Error, OutputRecord, Result};

/// Outcome of [`Finalizer::finalize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Record appended; `total` is the ledger size including it
    Completed { total: usize },
    /// Accumulator was already handed out, or is not complete
    AlreadyFinalized,
    /// Another path appended this id first
    AlreadyInLedger,
}

pub struct Finalizer {
    ledger: Arc<Ledger>,
    stats: Arc<GatherStats>,
    event_bus: EventBus,
}

impl Finalizer {
    pub fn new(ledger: Arc<Ledger>, stats: Arc<GatherStats>, event_bus: EventBus) -> Self {
        Self {
            ledger,
            stats,
            event_bus,
        }
    }

    /// Build the output record and append it
    ///
    /// The ledger's append is the single atomic step: it checks the id,
    /// writes the line and bumps the completed count under one lock.
    ///
    /// # Errors
    /// Fails if the record's facet keys do not equal the required set, or if
    /// the ledger write fails. Neither leaves a line in the ledger.
    pub async fn finalize(
        &self,
        item: &Item,
        page: &TalkPage,
        acc: &mut Accumulator,
    ) -> Result<FinalizeOutcome> {
        let Some(facets) = acc.take_complete() else {
            return Ok(FinalizeOutcome::AlreadyFinalized);
        };

        let name = if page.name.is_empty() {
            item.id.to_string()
        } else {
            page.name.clone()
        };

        let record = OutputRecord {
            id: item.id.clone(),
            name,
            metadata: item.metadata.clone(),
            facets,
            completed_at: Utc::now(),
        };

        if record.facet_codes() != item.required {
            return Err(Error::InvalidInput(format!(
                "record for {} has facets {} but {} are required",
                item.id,
                record.facet_codes(),
                item.required
            )));
        }

        match self.ledger.append(&record).await? {
            AppendOutcome::Appended { total } => {
                self.stats.record_completed();
                info!(item = %item.id, name = %record.name, total, "Item completed");
                self.event_bus.emit_lossy(GatherEvent::ItemCompleted {
                    id: item.id.clone(),
                    total_completed: total,
                });
                Ok(FinalizeOutcome::Completed { total })
            }
            AppendOutcome::AlreadyPresent => {
                warn!(item = %item.id, "Item already in ledger, not written again");
                Ok(FinalizeOutcome::AlreadyInLedger)
            }
        }
    }
}
