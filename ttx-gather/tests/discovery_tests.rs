//! Catalog discovery against scripted listing pages

mod helpers;

use helpers::{read_ledger, run_gather, settings, ScriptedFetcher};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use ttx_common::DiscoveredTalk;
use ttx_gather::config::InputSource;
use ttx_gather::remote::{FetchTarget, TedDecoder};
use ttx_gather::CatalogDiscovery;

fn read_discovered(path: &std::path::Path) -> Vec<DiscoveredTalk> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn scripted_site() -> ScriptedFetcher {
    ScriptedFetcher::new()
        .listing(&[
            &[("bilingual", "12:30"), ("english_only", "1h 2m")],
            &[("trilingual", "07:05"), ("broken", "10:00"), ("bilingual", "12:30")],
        ])
        .talk("bilingual", &["en", "fr"])
        .talk("english_only", &["en"])
        .talk("trilingual", &["de", "en", "fr"])
        .unreachable("broken")
}

#[tokio::test]
async fn test_discovery_records_languages_per_talk() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("all.jsonl");
    let fetcher = Arc::new(scripted_site());

    let discovery = CatalogDiscovery::new(fetcher.clone(), Arc::new(TedDecoder::new()), &output, 2);
    let summary = discovery.run(CancellationToken::new()).await.unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.listed, 4);
    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(fetcher.attempts(&FetchTarget::ListingPage(2)), 1);

    let mut talks = read_discovered(&output);
    talks.sort_by(|a, b| a.name.cmp(&b.name));
    let names: Vec<&str> = talks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["bilingual", "english_only", "trilingual"]);
    assert_eq!(talks[0].duration, Some(12));
    assert_eq!(talks[1].duration, Some(62));
    assert_eq!(talks[2].languages.len(), 3);
}

#[tokio::test]
async fn test_discovery_resumes_without_refetching() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("all.jsonl");
    let decoder = Arc::new(TedDecoder::new());

    let first = Arc::new(scripted_site());
    CatalogDiscovery::new(first, decoder.clone(), &output, 2)
        .run(CancellationToken::new())
        .await
        .unwrap();

    let second = Arc::new(scripted_site());
    let summary = CatalogDiscovery::new(second.clone(), decoder, &output, 2)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.already_known, 3);
    assert_eq!(summary.discovered, 0);
    assert_eq!(second.fetches_for("bilingual"), 0);
    // Talks that failed before are tried again.
    assert_eq!(second.fetches_for("broken"), 1);
    assert_eq!(read_discovered(&output).len(), 3);
}

#[tokio::test]
async fn test_missing_listing_index_is_fatal() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::new());
    let discovery = CatalogDiscovery::new(fetcher, Arc::new(TedDecoder::new()), &dir.path().join("all.jsonl"), 1);

    assert!(discovery.run(CancellationToken::new()).await.is_err());
}

#[tokio::test]
async fn test_gather_from_discovered_filters_by_language() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("all.jsonl");
    let fetcher = Arc::new(scripted_site());
    CatalogDiscovery::new(fetcher.clone(), Arc::new(TedDecoder::new()), &output, 2)
        .run(CancellationToken::new())
        .await
        .unwrap();

    let mut settings = settings(dir.path(), "en,fr", &[]);
    settings.input = InputSource::Discovered(output);
    let summary = run_gather(settings, &fetcher).await;

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.skipped, 0);
    assert_eq!(fetcher.transcript_attempts("english_only", "en"), 0);

    let mut ids: Vec<String> = read_ledger(&dir.path().join("transcripts.jsonl"))
        .into_iter()
        .map(|r| r.id.to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["bilingual", "trilingual"]);
}
