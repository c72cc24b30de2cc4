//! Persisted record types
//!
//! Every type here is written as one JSON object per line. The output
//! stream doubles as the completion ledger, so [`OutputRecord`] must stay
//! self-describing: a reader needs nothing but the line to know which item
//! it belongs to.

use crate::facets::{FacetCode, FacetSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique item identifier
///
/// All-digit identifiers are numeric talk ids; anything else is a talk slug.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for numeric talk ids (`1136`), false for slugs
    pub fn is_numeric(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One completed item: every required facet, exactly once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub id: ItemId,
    /// Display name (talk slug as served by the remote site)
    pub name: String,
    /// Passthrough metadata from the catalog (e.g. `gender`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Facet code → payload; key set equals the required facet set
    pub facets: BTreeMap<FacetCode, String>,
    pub completed_at: DateTime<Utc>,
}

impl OutputRecord {
    /// Key set of the facet map
    pub fn facet_codes(&self) -> FacetSet {
        self.facets.keys().cloned().collect()
    }
}

/// An item whose remote availability did not cover the required facets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipRecord {
    pub id: ItemId,
    /// Facets the remote site offered when the item was checked
    pub available: FacetSet,
    /// Required facets that were not offered
    pub missing: FacetSet,
    pub skipped_at: DateTime<Utc>,
}

/// One line of the catalog discovery output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredTalk {
    pub name: String,
    /// Talk length in minutes, when the listing showed one
    #[serde(default)]
    pub duration: Option<u32>,
    /// Codes as listed on the talk page; unusable ones are dropped on read
    #[serde(default)]
    pub languages: Vec<String>,
}

impl DiscoveredTalk {
    pub fn language_set(&self) -> FacetSet {
        self.languages.iter().filter_map(|code| FacetCode::new(code).ok()).collect()
    }
}
