//! JSON-lines files: replay and atomic single-line append
//!
//! Replay is strict about complete lines and lenient about a torn tail: a
//! final line that has no terminating newline and does not parse is what an
//! interrupted append leaves behind, so it is reported and cut off instead
//! of failing the whole replay.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Result of replaying a JSON-lines file
#[derive(Debug)]
pub struct Replay<T> {
    /// Parsed entries in file order
    pub entries: Vec<T>,
    /// Byte length of the valid prefix (everything up to the last good newline)
    pub valid_len: u64,
    /// True if a torn final line was found past `valid_len`
    pub torn_tail: bool,
}

/// Replay a JSON-lines file
///
/// A missing file replays as empty. Blank lines are ignored.
///
/// # Errors
/// - `Error::Io` if the file exists but cannot be read
/// - `Error::Ledger` for a malformed newline-terminated line
pub async fn replay<T: DeserializeOwned>(path: &Path) -> Result<Replay<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    let mut offset = 0usize;
    let mut line_no = 0usize;
    let mut torn_tail = false;

    while offset < bytes.len() {
        line_no += 1;
        let (line, next, terminated) = match bytes[offset..].iter().position(|&b| b == b'\n') {
            Some(pos) => (&bytes[offset..offset + pos], offset + pos + 1, true),
            None => (&bytes[offset..], bytes.len(), false),
        };

        let text = String::from_utf8_lossy(line);
        if text.trim().is_empty() {
            if terminated {
                offset = next;
            } else {
                torn_tail = true;
                break;
            }
            continue;
        }

        match serde_json::from_str::<T>(&text) {
            Ok(entry) => {
                entries.push(entry);
                if terminated {
                    offset = next;
                } else {
                    // Parsed but unterminated: keep it, the next append
                    // must start on a fresh line.
                    torn_tail = true;
                    offset = next;
                }
            }
            Err(e) if !terminated => {
                warn!(
                    file = %path.display(),
                    line = line_no,
                    error = %e,
                    "Discarding torn final line"
                );
                torn_tail = true;
                break;
            }
            Err(e) => {
                return Err(Error::Ledger {
                    path: path.to_path_buf(),
                    line: line_no,
                    message: e.to_string(),
                });
            }
        }
    }

    Ok(Replay {
        entries,
        valid_len: offset as u64,
        torn_tail,
    })
}

/// Append-only JSON-lines writer
#[derive(Debug)]
pub struct JsonlWriter {
    path: PathBuf,
    file: File,
}

impl JsonlWriter {
    /// Open for appending after a replay
    ///
    /// Creates the file (and parent directories) when missing. When the
    /// replay found a torn tail, the file is repaired first: an unparseable
    /// tail is truncated away, a parsed but unterminated one gets its newline.
    pub async fn open<T>(path: &Path, replay: &Replay<T>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .await?;

        if replay.torn_tail {
            let len = file.metadata().await?.len();
            if len > replay.valid_len {
                file.set_len(replay.valid_len).await?;
                warn!(
                    file = %path.display(),
                    kept_bytes = replay.valid_len,
                    "Truncated torn tail left by an interrupted run"
                );
            } else if replay.valid_len > 0 {
                file.write_all(b"\n").await?;
                file.flush().await?;
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one entry as a single line and sync it to disk
    pub async fn append<T: Serialize>(&mut self, entry: &T) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        self.file.write_all(&line).await?;
        self.file.flush().await?;
        self.file.sync_data().await?;
        Ok(())
    }
}
