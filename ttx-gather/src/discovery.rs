//! Catalog discovery
//!
//! Walks the site's talk listing and records, for every talk, its name,
//! length and the transcript languages it offers. The output is the
//! discovered-talks file that a later gather run filters by language.
//!
//! Discovery is resumable: talks already present in the output file are not
//! fetched again, so an interrupted walk picks up where it stopped.

use crate::remote::{Decoder, FetchTarget, Fetcher, ListingRow};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use ttx_common::jsonl::{self, JsonlWriter};
use ttx_common::{DiscoveredTalk, ItemId};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The first listing page is needed to know how many pages exist
    #[error("Cannot read talk listing: {0}")]
    Listing(String),

    #[error(transparent)]
    Storage(#[from] ttx_common::Error),
}

/// Counters for one discovery run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoverySummary {
    pub pages: u32,
    pub listed: usize,
    pub already_known: usize,
    pub discovered: usize,
    pub failed: usize,
}

pub struct CatalogDiscovery {
    fetcher: Arc<dyn Fetcher>,
    decoder: Arc<dyn Decoder>,
    output: PathBuf,
    concurrency: usize,
}

impl CatalogDiscovery {
    pub fn new(fetcher: Arc<dyn Fetcher>, decoder: Arc<dyn Decoder>, output: &Path, concurrency: usize) -> Self {
        Self {
            fetcher,
            decoder,
            output: output.to_path_buf(),
            concurrency: concurrency.max(1),
        }
    }

    /// Walk the listing and append every newly seen talk
    ///
    /// # Errors
    /// Fails if the output file cannot be replayed or written, or the first
    /// listing page cannot be read. Later listing pages and individual talk
    /// pages that fail are logged and left out.
    pub async fn run(&self, cancel: CancellationToken) -> Result<DiscoverySummary, DiscoveryError> {
        let replay = jsonl::replay::<DiscoveredTalk>(&self.output).await?;
        let mut known: HashSet<String> = replay.entries.iter().map(|t| t.name.clone()).collect();
        let mut writer = JsonlWriter::open(&self.output, &replay).await?;
        info!(output = %self.output.display(), known = known.len(), "Starting catalog discovery");

        let mut summary = DiscoverySummary::default();
        let rows = self.listing_rows(&mut summary, &cancel).await?;
        summary.listed = rows.len();

        let mut pending = Vec::new();
        for row in rows {
            if known.contains(&row.name) {
                summary.already_known += 1;
            } else {
                known.insert(row.name.clone());
                pending.push(row);
            }
        }
        info!(
            pages = summary.pages,
            listed = summary.listed,
            to_fetch = pending.len(),
            "Listing read"
        );

        let talks = stream::iter(pending)
            .take_while(|_| futures::future::ready(!cancel.is_cancelled()))
            .map(|row| self.inspect_talk(row))
            .buffer_unordered(self.concurrency);
        futures::pin_mut!(talks);

        while let Some(talk) = talks.next().await {
            match talk {
                Some(talk) => {
                    writer.append(&talk).await?;
                    summary.discovered += 1;
                    debug!(talk = %talk.name, languages = talk.languages.len(), "Talk discovered");
                }
                None => summary.failed += 1,
            }
        }

        info!(
            discovered = summary.discovered,
            already_known = summary.already_known,
            failed = summary.failed,
            "Catalog discovery finished"
        );
        Ok(summary)
    }

    /// Every listing row, first occurrence of a name only
    async fn listing_rows(
        &self,
        summary: &mut DiscoverySummary,
        cancel: &CancellationToken,
    ) -> Result<Vec<ListingRow>, DiscoveryError> {
        let raw = self
            .fetcher
            .fetch(&FetchTarget::ListingIndex)
            .await
            .map_err(|e| DiscoveryError::Listing(e.to_string()))?;
        let first = self
            .decoder
            .listing(&raw)
            .map_err(|e| DiscoveryError::Listing(e.to_string()))?;

        summary.pages = first.max_page.max(1);
        let mut seen = HashSet::new();
        let mut rows: Vec<ListingRow> = first.rows.into_iter().filter(|r| seen.insert(r.name.clone())).collect();

        for page in 2..=summary.pages {
            if cancel.is_cancelled() {
                break;
            }
            let decoded = match self.fetcher.fetch(&FetchTarget::ListingPage(page)).await {
                Ok(raw) => self.decoder.listing(&raw).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match decoded {
                Ok(listing) => rows.extend(listing.rows.into_iter().filter(|r| seen.insert(r.name.clone()))),
                Err(e) => warn!(page, error = %e, "Skipping unreadable listing page"),
            }
        }

        Ok(rows)
    }

    async fn inspect_talk(&self, row: ListingRow) -> Option<DiscoveredTalk> {
        let target = FetchTarget::Talk(ItemId::new(row.name.as_str()));
        let page = match self.fetcher.fetch(&target).await {
            Ok(raw) => self.decoder.availability(&raw),
            Err(e) => {
                warn!(talk = %row.name, error = %e, "Talk page fetch failed");
                return None;
            }
        };

        match page {
            Ok(page) => Some(DiscoveredTalk {
                name: row.name,
                duration: row.duration_minutes,
                languages: page.available.iter().map(|code| code.as_str().to_string()).collect(),
            }),
            Err(e) => {
                warn!(talk = %row.name, error = %e, "Talk page unreadable");
                None
            }
        }
    }
}
