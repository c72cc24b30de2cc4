//! Gather event types and the broadcast EventBus
//!
//! Events describe item lifecycle transitions as they happen. They are
//! informational: the ledger and skip log are the durable record, events are
//! for progress display and for tests that observe ordering.

use crate::facets::{FacetCode, FacetSet};
use crate::record::ItemId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Gather lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GatherEvent {
    /// Item passed admission and is being processed
    ItemAdmitted { id: ItemId },

    /// Item's remote availability does not cover the required facets
    ItemSkipped { id: ItemId, missing: FacetSet },

    /// A facet fetch failed or mismatched and is being reissued
    FacetRetry {
        id: ItemId,
        facet: FacetCode,
        remaining: u32,
    },

    /// A facet ran out of retries
    FacetAbandoned { id: ItemId, facet: FacetCode },

    /// Item record appended to the ledger
    ItemCompleted { id: ItemId, total_completed: usize },

    /// Item finished without every required facet
    ItemAbandoned { id: ItemId, missing: FacetSet },

    /// Completion budget reached; no further admissions this run
    AdmissionsClosed { completed: usize, budget: u64 },

    /// Gather run finished
    SessionFinished {
        completed: usize,
        skipped: usize,
        abandoned: usize,
        timestamp: DateTime<Utc>,
    },
}

impl GatherEvent {
    /// Item the event refers to, if any
    pub fn item_id(&self) -> Option<&ItemId> {
        match self {
            Self::ItemAdmitted { id }
            | Self::ItemSkipped { id, .. }
            | Self::FacetRetry { id, .. }
            | Self::FacetAbandoned { id, .. }
            | Self::ItemCompleted { id, .. }
            | Self::ItemAbandoned { id, .. } => Some(id),
            Self::AdmissionsClosed { .. } | Self::SessionFinished { .. } => None,
        }
    }
}

/// Broadcast bus for gather events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GatherEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<GatherEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: GatherEvent) -> Result<usize, broadcast::error::SendError<GatherEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: GatherEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
