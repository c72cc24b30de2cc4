//! ted.com-shaped HTML fixtures

pub const BASE_URL: &str = "https://www.ted.com";

/// Talk page offering transcripts in `languages`
pub fn talk_page(slug: &str, languages: &[&str]) -> String {
    let mut links = format!(
        r#"<link rel="alternate" hreflang="x-default" href="{}/talks/{}">"#,
        BASE_URL, slug
    );
    for code in languages {
        links.push_str(&format!(
            r#"<link rel="alternate" hreflang="{code}" href="{base}/talks/{slug}?language={code}">"#,
            code = code,
            base = BASE_URL,
            slug = slug
        ));
    }
    format!("<html><head>{}</head><body><h1>{}</h1></body></html>", links, slug)
}

/// Transcript page serving `code` with `text` (plain ASCII, no quotes)
pub fn transcript_page(code: &str, text: &str) -> String {
    format!(
        r#"<html><head>
        <script id="__NEXT_DATA__" type="application/json">{{"props":{{"pageProps":{{"transcriptData":{{"translation":{{"language":{{"internalLanguageCode":"{}"}}}}}}}}}}}}</script>
        <script type="application/ld+json">{{"@type":"VideoObject","transcript":"{}"}}</script>
        </head><body></body></html>"#,
        code, text
    )
}

/// Quick-list page with `(slug, duration)` rows and pagination up to `max_page`
pub fn listing_page(rows: &[(&str, &str)], max_page: u32) -> String {
    let rows: String = rows
        .iter()
        .map(|(slug, duration)| {
            format!(
                r#"<div class="quick-list__row">
                  <div class="col-xs-6 title"><span><a href="/talks/{}">{}</a></span></div>
                  <div class="col-xs-1">{}</div>
                </div>"#,
                slug, slug, duration
            )
        })
        .collect();
    let pagination: String = (1..=max_page)
        .map(|n| format!(r#"<a class="pagination__item pagination__link" href="?page={n}">{n}</a>"#, n = n))
        .collect();

    format!(
        r#"<html><body><div class="quick-list__container-row">{}</div>{}</body></html>"#,
        rows, pagination
    )
}
