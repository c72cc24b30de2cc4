//! Work items and their lifecycle

use std::collections::BTreeMap;
use std::fmt;
use ttx_common::{FacetSet, ItemId};

/// Item lifecycle state
///
/// ```text
/// Pending ──► Admitted ──┬──► Skipped    (availability does not cover required)
///                        ├──► Completed  (record appended to ledger)
///                        └──► Abandoned  (a facet ran out of retries, or unreachable)
/// ```
///
/// Skipped, Completed and Abandoned are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemStatus {
    Pending,
    Admitted,
    Skipped,
    Completed,
    Abandoned,
}

impl ItemStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Skipped | Self::Completed | Self::Abandoned)
    }

    fn can_transition_to(self, next: ItemStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Admitted)
                | (Self::Admitted, Self::Skipped)
                | (Self::Admitted, Self::Completed)
                | (Self::Admitted, Self::Abandoned)
        )
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Admitted => "admitted",
            Self::Skipped => "skipped",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

/// One unit of work: an item and the facets it needs
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub required: FacetSet,
    /// Passthrough metadata copied into the output record
    pub metadata: BTreeMap<String, String>,
    status: ItemStatus,
}

impl Item {
    pub fn new(id: ItemId, required: FacetSet) -> Self {
        Self {
            id,
            required,
            metadata: BTreeMap::new(),
            status: ItemStatus::Pending,
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    /// Move to `next` if the lifecycle allows it
    ///
    /// Returns false and leaves the status unchanged otherwise.
    pub fn transition_to(&mut self, next: ItemStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            tracing::warn!(
                item = %self.id,
                from = %self.status,
                to = %next,
                "Refusing invalid item status transition"
            );
            false
        }
    }
}
