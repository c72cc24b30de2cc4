//! Completion ledger
//!
//! The ledger is the output stream: one [`OutputRecord`] per line, appended
//! exactly once per item. Replaying it at startup yields the ids already
//! completed by earlier runs, which seeds admission and dedup.
//!
//! The in-memory id set, the completed count and the file handle sit under
//! one async mutex, so "is this id done?" and "append this record" can never
//! interleave in a way that writes an id twice.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};
use ttx_common::jsonl::{self, JsonlWriter};
use ttx_common::{ItemId, OutputRecord, Result};

/// Outcome of [`Ledger::append`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Record written; `total` is the completed count including it
    Appended { total: usize },
    /// Id was already in the ledger; nothing written
    AlreadyPresent,
}

/// Point-in-time view of one id against the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerStatus {
    pub completed: bool,
    pub total: usize,
}

struct LedgerState {
    writer: JsonlWriter,
    ids: HashSet<ItemId>,
}

/// Append-only completion ledger backed by a JSON-lines file
pub struct Ledger {
    path: PathBuf,
    state: Mutex<LedgerState>,
}

impl Ledger {
    /// Replay the ledger file and open it for appending
    ///
    /// A missing file starts an empty ledger.
    ///
    /// # Errors
    /// Fails if the file cannot be read or holds a malformed complete line;
    /// both are fatal for the run.
    pub async fn open(path: &Path) -> Result<Self> {
        let replay = jsonl::replay::<OutputRecord>(path).await?;

        let mut ids = HashSet::with_capacity(replay.entries.len());
        let mut duplicates = 0usize;
        for record in &replay.entries {
            if !ids.insert(record.id.clone()) {
                duplicates += 1;
                warn!(item = %record.id, ledger = %path.display(), "Duplicate id in ledger, counted once");
            }
        }

        let writer = JsonlWriter::open(path, &replay).await?;

        info!(
            ledger = %path.display(),
            completed = ids.len(),
            duplicates,
            "Ledger replayed"
        );

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(LedgerState { writer, ids }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn contains(&self, id: &ItemId) -> bool {
        self.state.lock().await.ids.contains(id)
    }

    /// Number of completed items, prior runs included
    pub async fn len(&self) -> usize {
        self.state.lock().await.ids.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Membership and completed count, read under one lock
    pub async fn status_of(&self, id: &ItemId) -> LedgerStatus {
        let state = self.state.lock().await;
        LedgerStatus {
            completed: state.ids.contains(id),
            total: state.ids.len(),
        }
    }

    /// Append a record unless its id is already present
    ///
    /// The id is only marked completed after the line is on disk, so a failed
    /// write leaves the ledger exactly as it was.
    pub async fn append(&self, record: &OutputRecord) -> Result<AppendOutcome> {
        let mut state = self.state.lock().await;
        if state.ids.contains(&record.id) {
            return Ok(AppendOutcome::AlreadyPresent);
        }

        state.writer.append(record).await?;
        state.ids.insert(record.id.clone());

        Ok(AppendOutcome::Appended {
            total: state.ids.len(),
        })
    }
}
