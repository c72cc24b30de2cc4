//! Remote collaborators: page fetching and page decoding
//!
//! The gather pipeline only talks to the remote site through these two
//! traits. [`HttpFetcher`] and [`TedDecoder`] are the production
//! implementations; tests substitute scripted fetchers.

pub mod http;
pub mod ted;

pub use http::{HttpFetcher, HttpFetcherConfig};
pub use ted::TedDecoder;

use thiserror::Error;
use ttx_common::{FacetCode, FacetSet, ItemId};

/// What to fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchTarget {
    /// First page of the talk listing
    ListingIndex,
    /// Numbered page of the talk listing
    ListingPage(u32),
    /// Talk page (availability check)
    Talk(ItemId),
    /// Transcript of a talk in one language
    Transcript { page_url: String, facet: FacetCode },
}

/// Fetched page
#[derive(Debug, Clone)]
pub struct RawContent {
    /// Final URL after redirects
    pub url: String,
    pub body: String,
}

/// Fetch failure, after the fetcher's own retries
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Page fetcher
///
/// Implementations own pacing, timeouts and transport-level retries; callers
/// treat any returned error as one failed attempt.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, target: &FetchTarget) -> Result<RawContent, FetchError>;
}

/// Decoded talk page
#[derive(Debug, Clone, PartialEq)]
pub struct TalkPage {
    /// Canonical talk URL; transcript URLs hang off it
    pub page_url: String,
    /// Display name (talk slug)
    pub name: String,
    /// Languages the site offers transcripts in
    pub available: FacetSet,
}

/// Decoded transcript page
#[derive(Debug, Clone, PartialEq)]
pub struct FacetPayload {
    /// Language the site actually served
    pub facet: FacetCode,
    pub text: String,
}

/// One row of the talk listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRow {
    pub name: String,
    pub duration_minutes: Option<u32>,
}

/// Decoded listing page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    /// Highest page number in the pagination bar (1 if none)
    pub max_page: u32,
    pub rows: Vec<ListingRow>,
}

/// Decode failure
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Missing element: {0}")]
    MissingElement(&'static str),

    #[error("Invalid JSON in {context}: {message}")]
    InvalidJson {
        context: &'static str,
        message: String,
    },

    #[error("Malformed content: {0}")]
    Malformed(String),
}

/// Page decoder
pub trait Decoder: Send + Sync {
    /// Decode a talk page into its available transcript languages
    fn availability(&self, raw: &RawContent) -> Result<TalkPage, DecodeError>;

    /// Decode a transcript page into (served language, transcript text)
    fn facet(&self, raw: &RawContent) -> Result<FacetPayload, DecodeError>;

    /// Decode a page of the talk listing
    fn listing(&self, raw: &RawContent) -> Result<ListingPage, DecodeError>;
}
