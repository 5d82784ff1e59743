//! HTML link extraction
//!
//! A single pass over the document collects `<a href>` values in document
//! order; each one is resolved and normalized lazily by the returned iterator.
//! Links are only candidates here: dedup, depth and policy are applied by the
//! coordinator when enqueueing.

use crate::url::normalize_link;
use scraper::{Html, Selector};
use std::borrow::Cow;
use url::Url;

/// Extracts every followable link from an HTML document
///
/// Invalid hrefs (unsupported schemes, unparseable URLs, empty values) are
/// skipped. Duplicates within the page are kept; the visited set takes care of
/// them.
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base` - URL of the page, used to resolve relative links
///
/// # Example
///
/// ```
/// use linkdump::crawler::extract_links;
/// use url::Url;
///
/// let html = r#"<a href="/a">A</a> <a href="mailto:x@example.com">mail</a>"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let links: Vec<Url> = extract_links(html, &base).collect();
/// assert_eq!(links.len(), 1);
/// assert_eq!(links[0].as_str(), "https://example.com/a");
/// ```
pub fn extract_links<'a>(html: &str, base: &'a Url) -> impl Iterator<Item = Url> + 'a {
    collect_hrefs(html)
        .into_iter()
        .filter_map(move |href| match normalize_link(&href, base) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::trace!("Skipping link {:?} on {}: {}", href, base, e);
                None
            }
        })
}

/// Returns true if a body with this Content-Type should be parsed for links
///
/// A missing Content-Type is treated as HTML.
pub fn is_html(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(value) => {
            let mime = value.split(';').next().unwrap_or("").trim();
            mime.eq_ignore_ascii_case("text/html")
                || mime.eq_ignore_ascii_case("application/xhtml+xml")
        }
    }
}

/// Decodes a response body for parsing; invalid UTF-8 is replaced
pub fn decode_body(body: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(body)
}

fn collect_hrefs(html: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(str::to_string)
        .collect()
}
