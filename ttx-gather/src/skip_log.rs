//! Persisted record of skipped items
//!
//! Kept apart from the ledger so skipped and completed items are never
//! conflated: the ledger is the output stream, this file is only consulted
//! by admission on later runs.

use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;
use ttx_common::jsonl::{self, JsonlWriter};
use ttx_common::{FacetSet, ItemId, Result, SkipRecord};

struct SkipState {
    writer: JsonlWriter,
    /// Last recorded availability per id
    available: HashMap<ItemId, FacetSet>,
}

/// Append-only skip log backed by a JSON-lines file
pub struct SkipLog {
    path: PathBuf,
    state: Mutex<SkipState>,
}

impl SkipLog {
    /// Replay the skip log and open it for appending
    pub async fn open(path: &Path) -> Result<Self> {
        let replay = jsonl::replay::<SkipRecord>(path).await?;

        // Later entries supersede earlier ones for the same id.
        let available: HashMap<ItemId, FacetSet> = replay
            .entries
            .iter()
            .map(|r| (r.id.clone(), r.available.clone()))
            .collect();

        let writer = JsonlWriter::open(path, &replay).await?;
        info!(skip_log = %path.display(), skipped = available.len(), "Skip log replayed");

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(SkipState { writer, available }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.available.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// True if the id was skipped before with availability that still does
    /// not cover `required`
    pub async fn still_skipped(&self, id: &ItemId, required: &FacetSet) -> bool {
        match self.state.lock().await.available.get(id) {
            Some(available) => !required.is_subset(available),
            None => false,
        }
    }

    /// Persist a skip decision
    pub async fn record(&self, id: &ItemId, available: &FacetSet, missing: &FacetSet) -> Result<()> {
        let entry = SkipRecord {
            id: id.clone(),
            available: available.clone(),
            missing: missing.clone(),
            skipped_at: Utc::now(),
        };

        let mut state = self.state.lock().await;
        state.writer.append(&entry).await?;
        state.available.insert(entry.id, entry.available);
        Ok(())
    }
}
