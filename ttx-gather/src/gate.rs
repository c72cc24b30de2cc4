//! Availability gate
//!
//! Fetches an admitted item's talk page once and checks that every required
//! facet is offered. Items that fail the check are skipped for good; items
//! whose page cannot be fetched or read are reported as unreachable, which
//! is not persisted.

use crate::item::Item;
use crate::remote::{DecodeError, Decoder, FetchError, FetchTarget, Fetcher, TalkPage};
use crate::stats::GatherStats;
use std::sync::Arc;
use thiserror::Error;
use ttx_common::FacetSet;

/// Pure subset check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Skip { missing: FacetSet },
}

pub fn check(required: &FacetSet, available: &FacetSet) -> GateDecision {
    if required.is_subset(available) {
        GateDecision::Proceed
    } else {
        GateDecision::Skip {
            missing: required.missing_from(available),
        }
    }
}

/// Why the availability check could not be made
#[derive(Debug, Error)]
pub enum GateError {
    #[error("talk page fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("talk page decode failed: {0}")]
    Decode(#[from] DecodeError),
}

/// Result of evaluating one item
#[derive(Debug)]
pub enum GateOutcome {
    Proceed(TalkPage),
    Skip { page: TalkPage, missing: FacetSet },
    Unreachable(GateError),
}

pub struct AvailabilityGate {
    fetcher: Arc<dyn Fetcher>,
    decoder: Arc<dyn Decoder>,
    stats: Arc<GatherStats>,
}

impl AvailabilityGate {
    pub fn new(fetcher: Arc<dyn Fetcher>, decoder: Arc<dyn Decoder>, stats: Arc<GatherStats>) -> Self {
        Self {
            fetcher,
            decoder,
            stats,
        }
    }

    pub async fn evaluate(&self, item: &Item) -> GateOutcome {
        match self.inspect(item).await {
            Ok(page) => match check(&item.required, &page.available) {
                GateDecision::Proceed => GateOutcome::Proceed(page),
                GateDecision::Skip { missing } => GateOutcome::Skip { page, missing },
            },
            Err(e) => GateOutcome::Unreachable(e),
        }
    }

    async fn inspect(&self, item: &Item) -> Result<TalkPage, GateError> {
        self.stats.record_fetch();
        let raw = self.fetcher.fetch(&FetchTarget::Talk(item.id.clone())).await?;
        Ok(self.decoder.availability(&raw)?)
    }
}
