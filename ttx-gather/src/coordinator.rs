//! Gather coordinator: per-item facet fan-out, retries and completion
//!
//! Each admitted item is owned by exactly one task. That task issues one
//! fetch per required facet, and every response for the item comes back
//! through its own loop, so the item's [`Accumulator`] has a single writer
//! and needs no lock. Facet fetches run concurrently and may resolve in any
//! order.
//!
//! A response whose served language differs from the requested one counts
//! as a failed attempt, the same as a fetch or decode error. Each
//! (item, facet) pair has its own retry counter. When a counter runs out,
//! that facet is abandoned. Sibling facets are not told and finish on their
//! own, but the item can no longer complete and ends Abandoned.

use crate::item::Item;
use crate::remote::{DecodeError, Decoder, FacetPayload, FetchError, FetchTarget, Fetcher, TalkPage};
use crate::stats::GatherStats;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use ttx_common::events::{EventBus, GatherEvent};
use ttx_common::{FacetCode, FacetSet, ItemId};

/// One failed facet attempt
#[derive(Debug, Error)]
pub enum FacetFailure {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
}

pub type FacetResponse = Result<FacetPayload, FacetFailure>;

/// What applying one response did to the accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetVerdict {
    /// Payload stored; `complete` once every required facet is present
    Recorded { complete: bool },
    /// Facet already collected; response dropped
    Duplicate,
    /// Attempt failed; one retry consumed, reissue the fetch
    Retry { remaining: u32 },
    /// Attempt failed with no retries left; facet given up
    Abandoned,
    /// Facet is not required, or was abandoned earlier
    Ignored,
}

/// Facets collected so far for one item, plus per-facet retry budgets
#[derive(Debug)]
pub struct Accumulator {
    item_id: ItemId,
    required: FacetSet,
    collected: BTreeMap<FacetCode, String>,
    retries: BTreeMap<FacetCode, u32>,
    abandoned: FacetSet,
    finalized: bool,
}

impl Accumulator {
    pub fn new(item_id: ItemId, required: FacetSet, retry_budget: u32) -> Self {
        let retries = required.iter().map(|f| (f.clone(), retry_budget)).collect();
        Self {
            item_id,
            required,
            collected: BTreeMap::new(),
            retries,
            abandoned: FacetSet::new(),
            finalized: false,
        }
    }

    /// Apply the response to a fetch of `requested`
    pub fn apply(&mut self, requested: &FacetCode, response: FacetResponse) -> FacetVerdict {
        if !self.required.contains(requested) {
            return FacetVerdict::Ignored;
        }
        if self.collected.contains_key(requested) {
            return FacetVerdict::Duplicate;
        }
        if self.abandoned.contains(requested) {
            return FacetVerdict::Ignored;
        }

        match response {
            Ok(payload) if payload.facet == *requested => {
                self.collected.insert(payload.facet, payload.text);
                FacetVerdict::Recorded {
                    complete: self.is_complete(),
                }
            }
            _ => {
                let remaining = self.retries.entry(requested.clone()).or_insert(0);
                if *remaining > 0 {
                    *remaining -= 1;
                    FacetVerdict::Retry {
                        remaining: *remaining,
                    }
                } else {
                    debug!(item = %self.item_id, facet = %requested, "No retries left for facet");
                    self.abandoned.insert(requested.clone());
                    FacetVerdict::Abandoned
                }
            }
        }
    }

    /// True when the collected key set equals the required set
    pub fn is_complete(&self) -> bool {
        self.collected.keys().eq(self.required.iter())
    }

    pub fn remaining_retries(&self, facet: &FacetCode) -> Option<u32> {
        self.retries.get(facet).copied()
    }

    /// Required facets not collected yet
    pub fn missing(&self) -> FacetSet {
        self.required
            .iter()
            .filter(|f| !self.collected.contains_key(*f))
            .cloned()
            .collect()
    }

    pub fn abandoned(&self) -> &FacetSet {
        &self.abandoned
    }

    /// Hand out the facet map, once, when complete
    pub fn take_complete(&mut self) -> Option<BTreeMap<FacetCode, String>> {
        if self.finalized || !self.is_complete() {
            return None;
        }
        self.finalized = true;
        Some(std::mem::take(&mut self.collected))
    }
}

/// Result of gathering one item
#[derive(Debug)]
pub enum GatherOutcome {
    Complete(Accumulator),
    Abandoned { abandoned: FacetSet, missing: FacetSet },
}

/// Short description of why a response counts as a failed attempt
fn failure_reason(requested: &FacetCode, response: &FacetResponse) -> Option<String> {
    match response {
        Ok(payload) if payload.facet == *requested => None,
        Ok(payload) => Some(format!("language mismatch: got {}", payload.facet)),
        Err(e) => Some(e.to_string()),
    }
}

pub struct GatherCoordinator {
    fetcher: Arc<dyn Fetcher>,
    decoder: Arc<dyn Decoder>,
    retry_budget: u32,
    stats: Arc<GatherStats>,
    event_bus: EventBus,
}

impl GatherCoordinator {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        decoder: Arc<dyn Decoder>,
        retry_budget: u32,
        stats: Arc<GatherStats>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            fetcher,
            decoder,
            retry_budget,
            stats,
            event_bus,
        }
    }

    /// Collect every required facet of `item`, retrying failed attempts
    pub async fn gather(&self, item: &Item, page: &TalkPage) -> GatherOutcome {
        let mut acc = Accumulator::new(item.id.clone(), item.required.clone(), self.retry_budget);

        let mut in_flight = FuturesUnordered::new();
        for facet in item.required.iter() {
            in_flight.push(self.fetch_facet(page, facet.clone()));
        }

        while let Some((facet, response)) = in_flight.next().await {
            let reason = failure_reason(&facet, &response);

            match acc.apply(&facet, response) {
                FacetVerdict::Recorded { complete } => {
                    debug!(item = %item.id, facet = %facet, complete, "Facet collected");
                }
                FacetVerdict::Retry { remaining } => {
                    self.stats.record_retry();
                    debug!(
                        item = %item.id,
                        facet = %facet,
                        remaining,
                        reason = reason.as_deref().unwrap_or_default(),
                        "Retrying facet"
                    );
                    self.event_bus.emit_lossy(GatherEvent::FacetRetry {
                        id: item.id.clone(),
                        facet: facet.clone(),
                        remaining,
                    });
                    in_flight.push(self.fetch_facet(page, facet));
                }
                FacetVerdict::Abandoned => {
                    warn!(
                        item = %item.id,
                        facet = %facet,
                        reason = reason.as_deref().unwrap_or_default(),
                        "Max retries reached, abandoning facet"
                    );
                    self.event_bus.emit_lossy(GatherEvent::FacetAbandoned {
                        id: item.id.clone(),
                        facet,
                    });
                }
                FacetVerdict::Duplicate | FacetVerdict::Ignored => {
                    debug!(item = %item.id, facet = %facet, "Dropping late facet response");
                }
            }
        }

        if acc.is_complete() {
            GatherOutcome::Complete(acc)
        } else {
            let missing = acc.missing();
            info!(item = %item.id, missing = %missing, "Item incomplete");
            GatherOutcome::Abandoned {
                abandoned: acc.abandoned().clone(),
                missing,
            }
        }
    }

    async fn fetch_facet(&self, page: &TalkPage, facet: FacetCode) -> (FacetCode, FacetResponse) {
        self.stats.record_fetch();
        let target = FetchTarget::Transcript {
            page_url: page.page_url.clone(),
            facet: facet.clone(),
        };

        let response = match self.fetcher.fetch(&target).await {
            Ok(raw) => self.decoder.facet(&raw).map_err(FacetFailure::from),
            Err(e) => Err(FacetFailure::from(e)),
        };
        (facet, response)
    }
}
