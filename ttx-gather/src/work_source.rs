//! Work source: the lazy, duplicate-free sequence of candidate items
//!
//! Candidates come from one of three inputs:
//! - an explicit id list
//! - an explicit catalog (`.csv` with a header, or JSON lines), whose id
//!   column is `name` when present and `id` otherwise; every other column is
//!   passthrough metadata
//! - a discovered-talks file, filtered to talks whose languages cover the
//!   required facet set
//!
//! Rows are read on demand. Unparseable rows are logged and skipped; only a
//! catalog that cannot be opened or has no id column is fatal.

use crate::item::Item;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use ttx_common::{DiscoveredTalk, Error, FacetSet, ItemId, Result};

type Candidates = Box<dyn Iterator<Item = Item> + Send>;

/// Lazy sequence of unique items; first occurrence of an id wins
pub struct WorkSource {
    candidates: Candidates,
    seen: HashSet<ItemId>,
    duplicates: Arc<AtomicUsize>,
}

impl WorkSource {
    fn new(candidates: Candidates) -> Self {
        Self {
            candidates,
            seen: HashSet::new(),
            duplicates: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Items from an explicit id list
    pub fn from_ids<I>(ids: I, required: &FacetSet) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        let required = required.clone();
        Self::new(Box::new(
            ids.into_iter()
                .map(ItemId::new)
                .filter(|id| !id.as_str().is_empty())
                .map(move |id| Item::new(id, required.clone())),
        ))
    }

    /// Items from an explicit catalog; format chosen by file extension
    pub fn from_catalog(path: &Path, required: &FacetSet) -> Result<Self> {
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

        if is_csv {
            Self::from_csv(path, required)
        } else {
            Self::from_jsonl_catalog(path, required)
        }
    }

    /// Items from candidates with known available facets, keeping those
    /// whose availability satisfies `keep`
    pub fn from_available<I, P>(candidates: I, required: &FacetSet, keep: P) -> Self
    where
        I: IntoIterator<Item = (ItemId, FacetSet)>,
        I::IntoIter: Send + 'static,
        P: Fn(&FacetSet) -> bool + Send + 'static,
    {
        let required = required.clone();
        Self::new(Box::new(candidates.into_iter().filter_map(move |(id, available)| {
            if keep(&available) {
                Some(Item::new(id, required.clone()))
            } else {
                debug!(item = %id, available = %available, "Candidate filtered out by availability");
                None
            }
        })))
    }

    /// Items from a discovered-talks file, keeping talks whose languages
    /// cover `required`
    pub fn from_discovered(path: &Path, required: &FacetSet) -> Result<Self> {
        let source = path.display().to_string();
        let lines = open_lines(path)?;

        let talks = lines.filter_map(move |(line_no, line)| match serde_json::from_str::<DiscoveredTalk>(&line) {
            Ok(talk) => Some((ItemId::new(talk.name.as_str()), talk.language_set())),
            Err(e) => {
                warn!(file = %source, line = line_no, error = %e, "Skipping malformed discovered talk");
                None
            }
        });

        let wanted = required.clone();
        Ok(Self::from_available(talks, required, move |available| wanted.is_subset(available)))
    }

    fn from_csv(path: &Path, required: &FacetSet) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)
            .map_err(|e| Error::Catalog(format!("cannot open {}: {}", path.display(), e)))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| Error::Catalog(format!("cannot read header of {}: {}", path.display(), e)))?
            .iter()
            .map(str::to_string)
            .collect();

        let id_column = headers
            .iter()
            .position(|h| h == "name")
            .or_else(|| headers.iter().position(|h| h == "id"))
            .ok_or_else(|| {
                Error::Catalog(format!(
                    "{} has neither a \"name\" nor an \"id\" column",
                    path.display()
                ))
            })?;

        let required = required.clone();
        let source = path.display().to_string();
        let candidates = reader
            .into_records()
            .enumerate()
            .filter_map(move |(row, record)| {
                // Header is line 1.
                let line_no = row + 2;
                let record = match record {
                    Ok(record) => record,
                    Err(e) => {
                        warn!(file = %source, line = line_no, error = %e, "Skipping malformed catalog row");
                        return None;
                    }
                };
                let id = record.get(id_column).unwrap_or_default();
                if id.is_empty() {
                    warn!(file = %source, line = line_no, "Skipping catalog row without id");
                    return None;
                }

                let metadata: BTreeMap<String, String> = headers
                    .iter()
                    .zip(record.iter())
                    .enumerate()
                    .filter(|(col, (_, value))| *col != id_column && !value.is_empty())
                    .map(|(_, (header, value))| (header.clone(), value.to_string()))
                    .collect();

                Some(Item::new(ItemId::new(id), required.clone()).with_metadata(metadata))
            });

        Ok(Self::new(Box::new(candidates)))
    }

    fn from_jsonl_catalog(path: &Path, required: &FacetSet) -> Result<Self> {
        let required = required.clone();
        let source = path.display().to_string();
        let lines = open_lines(path)?;

        let candidates = lines.filter_map(move |(line_no, line)| {
            let object = match serde_json::from_str::<Value>(&line) {
                Ok(Value::Object(object)) => object,
                Ok(_) => {
                    warn!(file = %source, line = line_no, "Skipping catalog line that is not an object");
                    return None;
                }
                Err(e) => {
                    warn!(file = %source, line = line_no, error = %e, "Skipping malformed catalog line");
                    return None;
                }
            };

            let id_key = if object.contains_key("name") { "name" } else { "id" };
            let Some(id) = object.get(id_key).and_then(scalar_text) else {
                warn!(file = %source, line = line_no, "Skipping catalog line without name or id");
                return None;
            };

            let metadata: BTreeMap<String, String> = object
                .iter()
                .filter(|(key, _)| key.as_str() != id_key)
                .filter_map(|(key, value)| scalar_text(value).map(|text| (key.clone(), text)))
                .filter(|(_, text)| !text.is_empty())
                .collect();

            Some(Item::new(ItemId::new(id), required.clone()).with_metadata(metadata))
        });

        Ok(Self::new(Box::new(candidates)))
    }

    /// Shared count of duplicate ids dropped so far
    pub fn duplicate_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.duplicates)
    }
}

impl Iterator for WorkSource {
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        for item in self.candidates.by_ref() {
            if self.seen.insert(item.id.clone()) {
                return Some(item);
            }
            self.duplicates.fetch_add(1, Ordering::Relaxed);
            warn!(item = %item.id, "Duplicate item id in work source, keeping first occurrence");
        }
        None
    }
}

/// Non-blank lines of a file with 1-based line numbers, read lazily
fn open_lines(path: &Path) -> Result<impl Iterator<Item = (usize, String)> + Send> {
    let file = File::open(path)
        .map_err(|e| Error::Catalog(format!("cannot open {}: {}", path.display(), e)))?;
    let source = path.display().to_string();

    Ok(BufReader::new(file)
        .lines()
        .enumerate()
        .filter_map(move |(idx, line)| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some((idx + 1, line)),
            Err(e) => {
                warn!(file = %source, line = idx + 1, error = %e, "Unreadable catalog line");
                None
            }
        }))
}

/// Strings as-is, numbers and booleans as text, everything else skipped
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn required() -> FacetSet {
        FacetSet::parse_list("en,fr").unwrap()
    }

    fn ids(source: WorkSource) -> Vec<String> {
        source.map(|item| item.id.to_string()).collect()
    }

    #[test]
    fn test_ids_dedup_first_wins() {
        let source = WorkSource::from_ids(
            vec!["a".to_string(), "b".to_string(), "a".to_string(), " ".to_string()],
            &required(),
        );
        let duplicates = source.duplicate_counter();

        assert_eq!(ids(source), vec!["a", "b"]);
        assert_eq!(duplicates.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_csv_prefers_name_column_and_keeps_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("talks.csv");
        std::fs::write(&path, "id,name,gender\n1,first_talk,female\n2,second_talk,\n3,,male\n").unwrap();

        let items: Vec<Item> = WorkSource::from_catalog(&path, &required()).unwrap().collect();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id.as_str(), "first_talk");
        assert_eq!(items[0].metadata.get("gender").map(String::as_str), Some("female"));
        assert_eq!(items[0].metadata.get("id").map(String::as_str), Some("1"));
        assert!(items[1].metadata.get("gender").is_none());
        assert_eq!(items[0].required, required());
    }

    #[test]
    fn test_csv_falls_back_to_id_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("talks.csv");
        std::fs::write(&path, "id,gender\n1136,male\n1137,female\n").unwrap();

        let source = WorkSource::from_catalog(&path, &required()).unwrap();
        assert_eq!(ids(source), vec!["1136", "1137"]);
    }

    #[test]
    fn test_csv_without_id_column_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("talks.csv");
        std::fs::write(&path, "title,gender\nx,y\n").unwrap();

        assert!(matches!(WorkSource::from_catalog(&path, &required()), Err(Error::Catalog(_))));
    }

    #[test]
    fn test_missing_catalog_is_fatal() {
        let dir = TempDir::new().unwrap();
        let result = WorkSource::from_catalog(&dir.path().join("nope.jsonl"), &required());
        assert!(matches!(result, Err(Error::Catalog(_))));
    }

    #[test]
    fn test_jsonl_catalog_skips_bad_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("talks.jsonl");
        std::fs::write(
            &path,
            "{\"id\": 1136, \"gender\": \"male\"}\nnot json\n[1]\n\n{\"name\": \"x\", \"duration\": 12}\n{\"other\": 1}\n",
        )
        .unwrap();

        let items: Vec<Item> = WorkSource::from_catalog(&path, &required()).unwrap().collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id.as_str(), "1136");
        assert_eq!(items[0].metadata.get("gender").map(String::as_str), Some("male"));
        assert_eq!(items[1].metadata.get("duration").map(String::as_str), Some("12"));
    }

    #[test]
    fn test_available_predicate_is_caller_supplied() {
        let candidates = vec![
            (ItemId::new("a"), FacetSet::parse_list("en").unwrap()),
            (ItemId::new("b"), FacetSet::parse_list("en,fr,de").unwrap()),
        ];
        let source = WorkSource::from_available(candidates, &required(), |available| available.len() > 2);
        assert_eq!(ids(source), vec!["b"]);
    }

    #[test]
    fn test_discovered_filters_by_required_languages() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"name\": \"both\", \"duration\": 10, \"languages\": [\"en\", \"fr\", \"de\"]}\n",
                "{\"name\": \"english_only\", \"duration\": 5, \"languages\": [\"en\"]}\n",
                "{\"name\": \"both\", \"duration\": 10, \"languages\": [\"en\", \"fr\"]}\n",
                "{\"name\": \"stray_code\", \"languages\": [\"en\", \"\", \"fr\"]}\n",
            ),
        )
        .unwrap();

        let source = WorkSource::from_discovered(&path, &required()).unwrap();
        let duplicates = source.duplicate_counter();
        assert_eq!(ids(source), vec!["both", "stray_code"]);
        assert_eq!(duplicates.load(Ordering::Relaxed), 1);
    }
}
