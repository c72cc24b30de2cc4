//! ttx-gather library interface
//!
//! Exposes the gather pipeline for the binary and for integration tests.

pub mod admission;
pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod finalizer;
pub mod gate;
pub mod item;
pub mod ledger;
pub mod remote;
pub mod session;
pub mod skip_log;
pub mod stats;
pub mod work_source;

pub use config::{ConfigOverrides, GatherSettings, InputSource};
pub use discovery::{CatalogDiscovery, DiscoverySummary};
pub use item::{Item, ItemStatus};
pub use session::GatherSession;
pub use stats::GatherSummary;
pub use work_source::WorkSource;
