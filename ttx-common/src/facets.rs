//! Facet codes and facet sets
//!
//! A facet is one language-specific sub-result of an item (one transcript
//! language of a talk). Facets are identified by their language code as the
//! remote site spells it (`en`, `fr`, `pt-br`, `zh-tw`).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Language code identifying one facet
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FacetCode(String);

impl FacetCode {
    /// Create a facet code, trimming surrounding whitespace
    ///
    /// Fails on empty codes and on codes containing whitespace or commas
    /// (commas separate codes in list form).
    pub fn new(code: impl AsRef<str>) -> Result<Self> {
        let code = code.as_ref().trim();
        if code.is_empty() {
            return Err(Error::InvalidInput("empty facet code".to_string()));
        }
        if code.chars().any(|c| c.is_whitespace() || c == ',') {
            return Err(Error::InvalidInput(format!("invalid facet code: {:?}", code)));
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FacetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FacetCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for FacetCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<FacetCode> for String {
    fn from(code: FacetCode) -> Self {
        code.0
    }
}

/// Ordered set of facet codes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacetSet(BTreeSet<FacetCode>);

impl FacetSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Parse a comma-separated list (`"en,fr, es"`)
    ///
    /// Empty entries are ignored, so an empty string yields an empty set.
    /// Callers that need a non-empty set use [`FacetSet::parse_required`].
    pub fn parse_list(list: &str) -> Result<Self> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(FacetCode::new)
            .collect()
    }

    /// Parse a required facet set; an empty result is a configuration error
    pub fn parse_required(list: &str) -> Result<Self> {
        let set = Self::parse_list(list)?;
        if set.is_empty() {
            return Err(Error::Config(
                "required facet set must name at least one language".to_string(),
            ));
        }
        Ok(set)
    }

    pub fn insert(&mut self, code: FacetCode) -> bool {
        self.0.insert(code)
    }

    pub fn contains(&self, code: &FacetCode) -> bool {
        self.0.contains(code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FacetCode> {
        self.0.iter()
    }

    pub fn is_subset(&self, other: &FacetSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Codes in `self` that are absent from `available`
    pub fn missing_from(&self, available: &FacetSet) -> FacetSet {
        Self(self.0.difference(&available.0).cloned().collect())
    }
}

impl FromIterator<FacetCode> for FacetSet {
    fn from_iter<I: IntoIterator<Item = FacetCode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for FacetSet {
    type Item = FacetCode;
    type IntoIter = std::collections::btree_set::IntoIter<FacetCode>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FacetSet {
    type Item = &'a FacetCode;
    type IntoIter = std::collections::btree_set::Iter<'a, FacetCode>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for FacetSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<&str> = self.0.iter().map(FacetCode::as_str).collect();
        f.write_str(&codes.join(","))
    }
}
