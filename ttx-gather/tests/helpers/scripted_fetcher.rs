//! In-memory fetcher serving scripted ted.com pages
//!
//! Counts every attempt per target so tests can assert exactly how many
//! fetches the pipeline issued.

use super::pages::{listing_page, talk_page, transcript_page, BASE_URL};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use ttx_common::FacetCode;
use ttx_gather::remote::ted::talk_slug;
use ttx_gather::remote::{FetchError, FetchTarget, Fetcher, RawContent};

/// Scripted reply to one transcript fetch
#[derive(Debug, Clone)]
pub enum Reply {
    /// Serve a transcript in this language
    Serve(String),
    /// Fail with HTTP 503
    Fail,
}

impl Reply {
    pub fn serve(code: &str) -> Self {
        Self::Serve(code.to_string())
    }
}

#[derive(Default)]
struct FetchLog {
    replies: HashMap<(String, FacetCode), VecDeque<Reply>>,
    attempts: HashMap<FetchTarget, usize>,
}

#[derive(Default)]
pub struct ScriptedFetcher {
    talks: HashMap<String, Vec<String>>,
    unreachable: HashSet<String>,
    listing: HashMap<u32, String>,
    delay: Option<Duration>,
    log: Mutex<FetchLog>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A talk whose page offers `languages`
    pub fn talk(mut self, slug: &str, languages: &[&str]) -> Self {
        self.talks
            .insert(slug.to_string(), languages.iter().map(|s| s.to_string()).collect());
        self
    }

    /// A talk whose page always fails to load
    pub fn unreachable(mut self, slug: &str) -> Self {
        self.unreachable.insert(slug.to_string());
        self
    }

    /// Replies for successive transcript fetches of (slug, facet); once the
    /// script runs out, the requested language is served
    pub fn script(self, slug: &str, facet: &str, replies: Vec<Reply>) -> Self {
        self.log
            .lock()
            .unwrap()
            .replies
            .insert((slug.to_string(), FacetCode::new(facet).unwrap()), replies.into());
        self
    }

    /// Listing pages, page 1 first
    pub fn listing(mut self, pages: &[&[(&str, &str)]]) -> Self {
        let max_page = pages.len() as u32;
        for (idx, rows) in pages.iter().enumerate() {
            self.listing.insert(idx as u32 + 1, listing_page(rows, max_page));
        }
        self
    }

    /// Sleep this long in every fetch, to force interleaving
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn attempts(&self, target: &FetchTarget) -> usize {
        self.log.lock().unwrap().attempts.get(target).copied().unwrap_or(0)
    }

    /// Transcript fetches of one (talk, language)
    pub fn transcript_attempts(&self, slug: &str, facet: &str) -> usize {
        self.attempts(&FetchTarget::Transcript {
            page_url: format!("{}/talks/{}", BASE_URL, slug),
            facet: FacetCode::new(facet).unwrap(),
        })
    }

    /// Every fetch that concerned one talk: its page plus all transcripts
    pub fn fetches_for(&self, slug: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .attempts
            .iter()
            .filter(|(target, _)| match target {
                FetchTarget::Talk(id) => id.as_str() == slug,
                FetchTarget::Transcript { page_url, .. } => talk_slug(page_url) == slug,
                _ => false,
            })
            .map(|(_, count)| count)
            .sum()
    }

    pub fn total_fetches(&self) -> usize {
        self.log.lock().unwrap().attempts.values().sum()
    }

    fn next_reply(&self, slug: &str, facet: &FacetCode) -> Reply {
        self.log
            .lock()
            .unwrap()
            .replies
            .get_mut(&(slug.to_string(), facet.clone()))
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Reply::Serve(facet.to_string()))
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, target: &FetchTarget) -> Result<RawContent, FetchError> {
        *self.log.lock().unwrap().attempts.entry(target.clone()).or_insert(0) += 1;

        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        match target {
            FetchTarget::ListingIndex => self.listing_page(1),
            FetchTarget::ListingPage(n) => self.listing_page(*n),
            FetchTarget::Talk(id) => {
                let slug = id.as_str();
                if self.unreachable.contains(slug) {
                    return Err(FetchError::Status(503));
                }
                let languages = self.talks.get(slug).ok_or(FetchError::Status(404))?;
                let languages: Vec<&str> = languages.iter().map(String::as_str).collect();
                Ok(RawContent {
                    url: format!("{}/talks/{}", BASE_URL, slug),
                    body: talk_page(slug, &languages),
                })
            }
            FetchTarget::Transcript { page_url, facet } => {
                let slug = talk_slug(page_url);
                match self.next_reply(slug, facet) {
                    Reply::Serve(code) => Ok(RawContent {
                        url: format!("{}/transcript?language={}", page_url, facet),
                        body: transcript_page(&code, &format!("{} in {}", slug, code)),
                    }),
                    Reply::Fail => Err(FetchError::Status(503)),
                }
            }
        }
    }
}

impl ScriptedFetcher {
    fn listing_page(&self, page: u32) -> Result<RawContent, FetchError> {
        let body = self.listing.get(&page).cloned().ok_or(FetchError::Status(404))?;
        Ok(RawContent {
            url: format!("{}/talks/quick-list?page={}", BASE_URL, page),
            body,
        })
    }
}
