//! Test Helper Utilities
//!
//! Shared utilities for testing ttx-gather against scripted remote content

#![allow(dead_code)]

pub mod pages;
pub mod scripted_fetcher;

pub use pages::{listing_page, talk_page, transcript_page};
pub use scripted_fetcher::ScriptedFetcher;

use std::path::Path;
use std::sync::Arc;
use ttx_common::events::{EventBus, GatherEvent};
use ttx_common::{FacetSet, OutputRecord};
use ttx_gather::config::{GatherSettings, InputSource};
use ttx_gather::remote::TedDecoder;
use ttx_gather::GatherSession;

/// Settings writing into `dir`, with fast retries and the given language list
pub fn settings(dir: &Path, languages: &str, ids: &[&str]) -> GatherSettings {
    let mut settings = GatherSettings::new(
        FacetSet::parse_required(languages).unwrap(),
        InputSource::Ids(ids.iter().map(|s| s.to_string()).collect()),
    );
    settings.output = dir.join("transcripts.jsonl");
    settings.skip_log = dir.join("transcripts.jsonl.skipped.jsonl");
    settings
}

pub async fn open_session(settings: GatherSettings, fetcher: &Arc<ScriptedFetcher>, event_bus: EventBus) -> GatherSession {
    GatherSession::open(settings, fetcher.clone(), Arc::new(TedDecoder::new()), event_bus)
        .await
        .expect("Failed to open session")
}

/// Every record in a ledger file, in file order
pub fn read_ledger(path: &Path) -> Vec<OutputRecord> {
    match std::fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).expect("Ledger line should parse"))
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Drain every event currently buffered on a receiver
pub fn drain(rx: &mut tokio::sync::broadcast::Receiver<GatherEvent>) -> Vec<GatherEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Open a session over `settings` and run it to the end
pub async fn run_gather(settings: GatherSettings, fetcher: &Arc<ScriptedFetcher>) -> ttx_gather::GatherSummary {
    let source = settings.work_source().expect("Failed to open work source");
    let session = open_session(settings, fetcher, EventBus::new(256)).await;
    session.run(source, tokio_util::sync::CancellationToken::new()).await
}
