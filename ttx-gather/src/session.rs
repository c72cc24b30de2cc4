//! Gather session: the pipeline driver
//!
//! Pulls candidates from the work source one at a time, admits each when a
//! processing slot frees up, and runs admitted items through
//! gate → coordinator → finalizer with at most `concurrency` items in flight.
//! Per-item failures are logged and counted; nothing an item does can abort
//! the run.
//!
//! Admission is evaluated lazily, so the completed count it reads includes
//! every item that finished before the slot opened. Once the budget is
//! reached the work source is not read any further.

use crate::admission::{Admission, AdmissionController, RejectReason};
use crate::config::GatherSettings;
use crate::coordinator::{GatherCoordinator, GatherOutcome};
use crate::finalizer::{FinalizeOutcome, Finalizer};
use crate::gate::{AvailabilityGate, GateOutcome};
use crate::item::{Item, ItemStatus};
use crate::ledger::Ledger;
use crate::remote::{Decoder, Fetcher};
use crate::skip_log::SkipLog;
use crate::stats::{GatherStats, GatherSummary};
use crate::work_source::WorkSource;
use chrono::Utc;
use futures::future;
use futures::stream::{self, StreamExt};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use ttx_common::events::{EventBus, GatherEvent};
use ttx_common::{FacetSet, Result};

pub struct GatherSession {
    settings: GatherSettings,
    ledger: Arc<Ledger>,
    skip_log: Arc<SkipLog>,
    admission: AdmissionController,
    gate: AvailabilityGate,
    coordinator: GatherCoordinator,
    finalizer: Finalizer,
    stats: Arc<GatherStats>,
    event_bus: EventBus,
}

impl GatherSession {
    /// Replay the ledger and skip log and wire up the pipeline
    ///
    /// # Errors
    /// Fails if either file cannot be read or holds a malformed line.
    pub async fn open(
        settings: GatherSettings,
        fetcher: Arc<dyn Fetcher>,
        decoder: Arc<dyn Decoder>,
        event_bus: EventBus,
    ) -> Result<Self> {
        let ledger = Arc::new(Ledger::open(&settings.output).await?);
        let skip_log = Arc::new(SkipLog::open(&settings.skip_log).await?);
        let stats = Arc::new(GatherStats::new());

        let honored_skips = if settings.recheck_skipped {
            info!("Rechecking previously skipped items");
            None
        } else {
            Some(Arc::clone(&skip_log))
        };

        let admission = AdmissionController::new(
            Arc::clone(&ledger),
            honored_skips,
            settings.required.clone(),
            settings.budget,
        );
        let gate = AvailabilityGate::new(Arc::clone(&fetcher), Arc::clone(&decoder), Arc::clone(&stats));
        let coordinator = GatherCoordinator::new(
            fetcher,
            decoder,
            settings.max_retries,
            Arc::clone(&stats),
            event_bus.clone(),
        );
        let finalizer = Finalizer::new(Arc::clone(&ledger), Arc::clone(&stats), event_bus.clone());

        Ok(Self {
            settings,
            ledger,
            skip_log,
            admission,
            gate,
            coordinator,
            finalizer,
            stats,
            event_bus,
        })
    }

    /// Process the work source until it is exhausted, the budget is reached
    /// or `cancel` fires
    ///
    /// Cancellation stops admissions only; items already in flight finish.
    pub async fn run(&self, source: WorkSource, cancel: CancellationToken) -> GatherSummary {
        let duplicates = source.duplicate_counter();
        let run_id = Uuid::new_v4();

        info!(
            run_id = %run_id,
            languages = %self.settings.required,
            budget = %self.settings.budget,
            concurrency = self.settings.concurrency,
            "Gather run starting"
        );

        stream::iter(source)
            .take_while(|_| future::ready(!cancel.is_cancelled()))
            .then(|item| async move {
                let admission = self.admission.try_admit(&item.id).await;
                (item, admission)
            })
            .take_while(|(_, admission)| {
                if let Admission::Deferred { completed } = admission {
                    info!(completed, budget = %self.settings.budget, "Completion budget reached, closing admissions");
                    self.event_bus.emit_lossy(GatherEvent::AdmissionsClosed {
                        completed: *completed,
                        budget: self.settings.budget.limit().unwrap_or(0),
                    });
                    future::ready(false)
                } else {
                    future::ready(true)
                }
            })
            .filter_map(|(item, admission)| future::ready(self.admitted(item, admission)))
            .map(|item| self.process_item(item))
            .buffer_unordered(self.settings.concurrency)
            .for_each(|_| future::ready(()))
            .await;

        if cancel.is_cancelled() {
            info!("Gather run cancelled, in-flight items finished");
        }

        let summary = self
            .stats
            .summary(duplicates.load(Ordering::Relaxed), self.ledger.len().await);

        info!(
            run_id = %run_id,
            admitted = summary.admitted,
            completed = summary.completed,
            skipped = summary.skipped,
            abandoned = summary.abandoned,
            ledger_total = summary.ledger_total,
            "Gather run finished"
        );
        self.event_bus.emit_lossy(GatherEvent::SessionFinished {
            completed: summary.completed,
            skipped: summary.skipped,
            abandoned: summary.abandoned,
            timestamp: Utc::now(),
        });

        summary
    }

    /// Record the admission decision; admitted items pass through
    fn admitted(&self, mut item: Item, admission: Admission) -> Option<Item> {
        match admission {
            Admission::Admitted => {
                item.transition_to(ItemStatus::Admitted);
                self.stats.record_admitted();
                info!(item = %item.id, "Item admitted");
                self.event_bus.emit_lossy(GatherEvent::ItemAdmitted { id: item.id.clone() });
                Some(item)
            }
            Admission::Rejected(RejectReason::AlreadyCompleted) => {
                debug!(item = %item.id, "Already in ledger, not admitted");
                self.stats.record_rejected_completed();
                None
            }
            Admission::Rejected(RejectReason::PreviouslySkipped) => {
                debug!(item = %item.id, "Skipped on an earlier run, not admitted");
                self.stats.record_rejected_skipped();
                None
            }
            Admission::Deferred { .. } => None,
        }
    }

    async fn process_item(&self, mut item: Item) -> ItemStatus {
        let page = match self.gate.evaluate(&item).await {
            GateOutcome::Proceed(page) => page,
            GateOutcome::Skip { page, missing } => {
                info!(item = %item.id, available = %page.available, missing = %missing, "Required languages not offered, skipping");
                if let Err(e) = self.skip_log.record(&item.id, &page.available, &missing).await {
                    warn!(item = %item.id, error = %e, "Failed to persist skip decision");
                }
                self.stats.record_skipped();
                item.transition_to(ItemStatus::Skipped);
                self.event_bus.emit_lossy(GatherEvent::ItemSkipped {
                    id: item.id.clone(),
                    missing,
                });
                return item.status();
            }
            GateOutcome::Unreachable(e) => {
                warn!(item = %item.id, error = %e, "Availability check failed, abandoning item for this run");
                self.stats.record_unreachable();
                let missing = item.required.clone();
                self.abandon(&mut item, missing);
                return item.status();
            }
        };

        match self.coordinator.gather(&item, &page).await {
            GatherOutcome::Complete(mut acc) => {
                match self.finalizer.finalize(&item, &page, &mut acc).await {
                    Ok(FinalizeOutcome::Completed { .. }) | Ok(FinalizeOutcome::AlreadyInLedger) => {
                        item.transition_to(ItemStatus::Completed);
                    }
                    Ok(FinalizeOutcome::AlreadyFinalized) => {
                        warn!(item = %item.id, "Accumulator already finalized");
                        self.abandon(&mut item, acc.missing());
                    }
                    Err(e) => {
                        error!(item = %item.id, error = %e, "Failed to append record to ledger");
                        self.abandon(&mut item, FacetSet::new());
                    }
                }
            }
            GatherOutcome::Abandoned { abandoned, missing } => {
                warn!(item = %item.id, abandoned = %abandoned, missing = %missing, "Item abandoned");
                self.abandon(&mut item, missing);
            }
        }

        item.status()
    }

    fn abandon(&self, item: &mut Item, missing: FacetSet) {
        self.stats.record_abandoned();
        item.transition_to(ItemStatus::Abandoned);
        self.event_bus.emit_lossy(GatherEvent::ItemAbandoned {
            id: item.id.clone(),
            missing,
        });
    }
}
