//! TED page decoder
//!
//! Talk pages list their transcript languages as `hreflang` alternates.
//! Transcript pages carry the served language in the Next.js data blob and
//! the transcript text in the JSON-LD block. The site sometimes serves a
//! different language than the one requested; the decoder reports what was
//! served and leaves the mismatch decision to the coordinator.

use super::{DecodeError, Decoder, FacetPayload, ListingPage, ListingRow, RawContent, TalkPage};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use ttx_common::{FacetCode, FacetSet};

const ALTERNATE_LINKS: &str = r#"link[rel="alternate"][hreflang]"#;
const NEXT_DATA: &str = "script#__NEXT_DATA__";
const LD_JSON: &str = r#"script[type="application/ld+json"]"#;
const LANGUAGE_POINTER: &str = "/props/pageProps/transcriptData/translation/language/internalLanguageCode";
const LISTING_ROWS: &str = "div.quick-list__container-row > div.quick-list__row";
const LISTING_TITLE: &str = "div.title a";
const LISTING_DURATION: &str = "div.col-xs-1";
const PAGINATION: &str = "a.pagination__item.pagination__link";

/// Decoder for ted.com markup
#[derive(Debug, Clone, Default)]
pub struct TedDecoder;

impl TedDecoder {
    pub fn new() -> Self {
        Self
    }
}

fn selector(css: &'static str) -> Result<Selector, DecodeError> {
    Selector::parse(css).map_err(|e| DecodeError::Malformed(format!("selector {}: {}", css, e)))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// Last path segment of a URL, ignoring query, fragment and trailing slash
pub fn talk_slug(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url).trim_end_matches('/');
    path.rsplit('/').next().unwrap_or(path)
}

/// Canonical page URL: query and fragment stripped, no trailing slash
fn canonical_url(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .unwrap_or(url)
        .trim_end_matches('/')
        .to_string()
}

/// Decode HTML entities left in JSON-LD text (`&#39;`, `&quot;`, `&amp;`)
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    // Raw angle brackets would otherwise be parsed as markup.
    let escaped = text.replace('<', "&lt;");
    Html::parse_fragment(&escaped).root_element().text().collect()
}

/// Listing duration text to minutes: `"12:34"` is mm:ss, `"1h 5m"` is h/m
pub fn parse_duration_minutes(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.contains('h') {
        let normalized = text.replace('h', ":").replace('m', "");
        let mut parts = normalized.split(':').map(str::trim);
        let hours: u32 = parts.next()?.parse().ok()?;
        let minutes: u32 = match parts.next() {
            Some("") | None => 0,
            Some(m) => m.parse().ok()?,
        };
        hours.checked_mul(60)?.checked_add(minutes)
    } else {
        text.split(':').next()?.trim().parse().ok()
    }
}

impl Decoder for TedDecoder {
    fn availability(&self, raw: &RawContent) -> Result<TalkPage, DecodeError> {
        let doc = Html::parse_document(&raw.body);
        let links = selector(ALTERNATE_LINKS)?;

        let mut seen_any = false;
        let mut available = FacetSet::new();
        for link in doc.select(&links) {
            seen_any = true;
            let element = link.value();
            if element.attr("hreflang") == Some("x-default") {
                continue;
            }
            let Some((_, code)) = element.attr("href").and_then(|href| href.rsplit_once('=')) else {
                continue;
            };
            match FacetCode::new(code) {
                Ok(code) => {
                    available.insert(code);
                }
                Err(e) => tracing::debug!(url = %raw.url, error = %e, "Ignoring alternate link"),
            }
        }

        if !seen_any {
            return Err(DecodeError::MissingElement(ALTERNATE_LINKS));
        }

        Ok(TalkPage {
            page_url: canonical_url(&raw.url),
            name: talk_slug(&raw.url).to_string(),
            available,
        })
    }

    fn facet(&self, raw: &RawContent) -> Result<FacetPayload, DecodeError> {
        let doc = Html::parse_document(&raw.body);

        let next_data = doc
            .select(&selector(NEXT_DATA)?)
            .next()
            .map(element_text)
            .ok_or(DecodeError::MissingElement(NEXT_DATA))?;
        let next_data: Value = serde_json::from_str(&next_data).map_err(|e| DecodeError::InvalidJson {
            context: NEXT_DATA,
            message: e.to_string(),
        })?;
        let served = next_data
            .pointer(LANGUAGE_POINTER)
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingElement("internalLanguageCode"))?;
        let facet = FacetCode::new(served).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let mut transcript = None;
        for script in doc.select(&selector(LD_JSON)?) {
            let value: Value = serde_json::from_str(&element_text(script)).map_err(|e| DecodeError::InvalidJson {
                context: LD_JSON,
                message: e.to_string(),
            })?;
            if let Some(text) = value.get("transcript").and_then(Value::as_str) {
                transcript = Some(decode_entities(text));
                break;
            }
        }

        let text = transcript.ok_or(DecodeError::MissingElement("ld+json transcript"))?;
        Ok(FacetPayload { facet, text })
    }

    fn listing(&self, raw: &RawContent) -> Result<ListingPage, DecodeError> {
        let doc = Html::parse_document(&raw.body);
        let title = selector(LISTING_TITLE)?;
        let duration = selector(LISTING_DURATION)?;

        let max_page = doc
            .select(&selector(PAGINATION)?)
            .filter_map(|a| element_text(a).trim().parse::<u32>().ok())
            .max()
            .unwrap_or(1);

        let rows = doc
            .select(&selector(LISTING_ROWS)?)
            .filter_map(|row| {
                let href = row.select(&title).next()?.value().attr("href")?;
                let name = talk_slug(href);
                if name.is_empty() {
                    return None;
                }
                let duration_text: String = row.select(&duration).map(element_text).collect();
                Some(ListingRow {
                    name: name.to_string(),
                    duration_minutes: parse_duration_minutes(&duration_text),
                })
            })
            .collect();

        Ok(ListingPage { max_page, rows })
    }
}
