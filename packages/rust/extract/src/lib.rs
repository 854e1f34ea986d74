//! Per-URL page fetching and text extraction.
//!
//! [`PageExtractor`] applies the same-host policy, robots.txt exclusions,
//! and `<meta name="robots">` handling, then strips boilerplate and returns
//! clean text with a content fingerprint. Each refusal or failure is a
//! structured [`SkipReason`] the crawl loop can branch on; none of them is
//! fatal to the crawl as a whole.

pub mod robots;
pub mod text;

use std::time::Duration;

use reqwest::Client;
use scraper::Html;
use sha2::{Digest, Sha256};
use siteassist_shared::{Result, SiteAssistError, USER_AGENT};
use tracing::debug;
use url::Url;

use crate::robots::RobotsCache;

/// Timeout for fetching a page.
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Maximum redirects per page fetch.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Why a URL was skipped instead of indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Host differs from the site's own host.
    Offsite,
    /// robots.txt disallows the path.
    Robots,
    /// The page declares `<meta name="robots" content="noindex">`.
    Noindex,
    /// Transport-level fetch failure.
    Transport(String),
    /// Non-200 response.
    HttpStatus(u16),
    /// 200 response with an empty body.
    EmptyBody,
    /// Parsed fine but produced no extractable text.
    NoText,
}

impl SkipReason {
    /// Short stable label, suitable for a document's error column.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Offsite => "offsite",
            Self::Robots => "robots",
            Self::Noindex => "noindex",
            Self::Transport(_) => "transport",
            Self::HttpStatus(_) => "http",
            Self::EmptyBody => "empty",
            Self::NoText => "no-text",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::HttpStatus(code) => write!(f, "HTTP {code}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Clean extraction result for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    /// Page title, or the URL itself when the page has no `<title>`.
    pub title: String,
    /// Boilerplate-stripped text (headings, paragraphs, list items).
    pub text: String,
    /// SHA-256 fingerprint of `text`, for change detection.
    pub content_hash: String,
}

// ---------------------------------------------------------------------------
// PageExtractor
// ---------------------------------------------------------------------------

/// Fetches same-host pages and extracts readable text.
pub struct PageExtractor {
    client: Client,
    site_host: String,
    robots: RobotsCache,
}

impl PageExtractor {
    /// Create an extractor scoped to the host of `site_url`.
    pub fn new(site_url: &Url) -> Result<Self> {
        let site_host = site_url
            .host_str()
            .ok_or_else(|| {
                SiteAssistError::validation(format!("site URL has no host: {site_url}"))
            })?
            .to_lowercase();

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| SiteAssistError::Network(format!("failed to build HTTP client: {e}")))?;

        let robots = RobotsCache::new(client.clone());

        Ok(Self {
            client,
            site_host,
            robots,
        })
    }

    /// Fetch and extract one page.
    ///
    /// The error side is a [`SkipReason`] — callers skip the URL and move on.
    pub async fn extract(&self, url: &Url) -> std::result::Result<ExtractedPage, SkipReason> {
        let host = url.host_str().unwrap_or_default();
        if !host.eq_ignore_ascii_case(&self.site_host) {
            return Err(SkipReason::Offsite);
        }

        if !self.robots.allows(url).await {
            return Err(SkipReason::Robots);
        }

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| SkipReason::Transport(e.to_string()))?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(SkipReason::HttpStatus(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SkipReason::Transport(e.to_string()))?;
        if body.is_empty() {
            return Err(SkipReason::EmptyBody);
        }

        // Tolerant parse: malformed markup yields a best-effort tree, never
        // an error.
        let doc = Html::parse_document(&body);

        if text::has_noindex(&doc) {
            return Err(SkipReason::Noindex);
        }

        let extracted = text::extract_text(&doc);
        if extracted.is_empty() {
            return Err(SkipReason::NoText);
        }

        let title = text::extract_title(&doc).unwrap_or_else(|| url.to_string());
        let content_hash = sha256_hex(&extracted);

        debug!(%url, chars = extracted.len(), "page extracted");

        Ok(ExtractedPage {
            title,
            text: extracted,
            content_hash,
        })
    }
}

/// Hex-encoded SHA-256 of a string.
pub fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor_for(server: &wiremock::MockServer) -> PageExtractor {
        let site = Url::parse(&server.uri()).unwrap();
        PageExtractor::new(&site).unwrap()
    }

    fn mount_robots(server: &wiremock::MockServer, body: &str) -> wiremock::Mock {
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/robots.txt"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(body))
    }

    #[tokio::test]
    async fn extracts_title_text_and_hash() {
        let server = wiremock::MockServer::start().await;
        mount_robots(&server, "User-agent: *\n").mount(&server).await;

        let html = r#"<html><head><title>About Us</title></head><body>
            <h1>About</h1>
            <p>We make things.</p>
            <ul><li>Quality</li></ul>
        </body></html>"#;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/about"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(html))
            .mount(&server)
            .await;

        let extractor = extractor_for(&server);
        let url = Url::parse(&format!("{}/about", server.uri())).unwrap();
        let page = extractor.extract(&url).await.unwrap();

        assert_eq!(page.title, "About Us");
        assert_eq!(
            page.text,
            "H1: About\n\nWe make things.\n\n\u{2022} Quality"
        );
        assert_eq!(page.content_hash, sha256_hex(&page.text));
        assert_eq!(page.content_hash.len(), 64);
    }

    #[tokio::test]
    async fn offsite_url_refused_without_fetch() {
        let server = wiremock::MockServer::start().await;
        let extractor = extractor_for(&server);

        let url = Url::parse("https://elsewhere.test/page").unwrap();
        assert_eq!(extractor.extract(&url).await, Err(SkipReason::Offsite));
    }

    #[tokio::test]
    async fn robots_disallow_refused() {
        let server = wiremock::MockServer::start().await;
        mount_robots(&server, "User-agent: *\nDisallow: /private\n")
            .mount(&server)
            .await;

        let extractor = extractor_for(&server);
        let url = Url::parse(&format!("{}/private/page", server.uri())).unwrap();
        assert_eq!(extractor.extract(&url).await, Err(SkipReason::Robots));
    }

    #[tokio::test]
    async fn noindex_refused() {
        let server = wiremock::MockServer::start().await;
        mount_robots(&server, "User-agent: *\n").mount(&server).await;

        let html = r#"<html><head><meta name="robots" content="noindex"></head>
            <body><p>Hidden content.</p></body></html>"#;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/hidden"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(html))
            .mount(&server)
            .await;

        let extractor = extractor_for(&server);
        let url = Url::parse(&format!("{}/hidden", server.uri())).unwrap();
        assert_eq!(extractor.extract(&url).await, Err(SkipReason::Noindex));
    }

    #[tokio::test]
    async fn non_200_is_http_skip() {
        let server = wiremock::MockServer::start().await;
        mount_robots(&server, "User-agent: *\n").mount(&server).await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/gone"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let extractor = extractor_for(&server);
        let url = Url::parse(&format!("{}/gone", server.uri())).unwrap();
        assert_eq!(
            extractor.extract(&url).await,
            Err(SkipReason::HttpStatus(404))
        );
    }

    #[tokio::test]
    async fn no_text_refused() {
        let server = wiremock::MockServer::start().await;
        mount_robots(&server, "User-agent: *\n").mount(&server).await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/bare"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("<html><body><div>nothing extractable</div></body></html>"),
            )
            .mount(&server)
            .await;

        let extractor = extractor_for(&server);
        let url = Url::parse(&format!("{}/bare", server.uri())).unwrap();
        assert_eq!(extractor.extract(&url).await, Err(SkipReason::NoText));
    }

    #[test]
    fn sha256_known_value() {
        assert_eq!(
            sha256_hex("hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
