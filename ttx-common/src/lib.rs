//! # TTX Common Library
//!
//! Shared code for the ttx transcript gatherer including:
//! - Facet and record data model (FacetCode, OutputRecord, SkipRecord)
//! - Event types (GatherEvent enum) and the broadcast EventBus
//! - Configuration loading (TOML bootstrap file)
//! - JSON-lines persistence helpers used by the ledger and skip log

pub mod config;
pub mod error;
pub mod events;
pub mod facets;
pub mod jsonl;
pub mod record;

pub use error::{Error, Result};
pub use facets::{FacetCode, FacetSet};
pub use record::{DiscoveredTalk, ItemId, OutputRecord, SkipRecord};
