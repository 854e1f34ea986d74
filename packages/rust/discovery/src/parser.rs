//! Shallow sitemap XML parser.
//!
//! Sitemaps in the wild carry assorted namespaces (`<loc>`, `<sm:loc>`) and
//! occasionally broken markup. Rather than a strict XML parse that fails the
//! whole document, `<loc>` elements are matched namespace-agnostically and
//! everything else is ignored.

use std::sync::LazyLock;

use regex::Regex;

/// Matches `<loc>…</loc>` with an optional namespace prefix on the tag.
static LOC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<\s*(?:[a-z0-9_.-]+:)?loc\s*>\s*([^<]+?)\s*<").expect("loc regex")
});

/// Extract page URLs from sitemap XML, stopping at `limit`.
///
/// Entity-escaped ampersands are unescaped (the one entity that commonly
/// appears inside `<loc>` URLs). Empty entries are skipped.
pub fn parse_sitemap(xml: &str, limit: usize) -> Vec<String> {
    let mut urls = Vec::new();

    for caps in LOC_RE.captures_iter(xml) {
        if urls.len() >= limit {
            break;
        }
        let raw = caps[1].trim();
        if raw.is_empty() {
            continue;
        }
        urls.push(raw.replace("&amp;", "&"));
    }

    urls
}
