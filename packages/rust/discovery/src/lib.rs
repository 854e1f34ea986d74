//! Sitemap discovery: fetch the configured sitemap and extract page URLs.
//!
//! The crawl is seeded exclusively from the site's own sitemap (plus the
//! optional priority URL handled by the orchestrator). Parsing is shallow
//! and namespace-agnostic — only `<loc>` elements are read, and collection
//! stops at the page cap during parsing itself.

mod parser;

use std::time::Duration;

use reqwest::Client;
use siteassist_shared::{Result, SiteAssistError, USER_AGENT};
use tracing::{debug, info, instrument};
use url::Url;

pub use parser::parse_sitemap;

/// Maximum number of redirects to follow when fetching the sitemap.
const MAX_REDIRECTS: usize = 3;

/// Default timeout in seconds for fetching the sitemap.
const DEFAULT_TIMEOUT_SECS: u64 = 15;

// ---------------------------------------------------------------------------
// Discovery options
// ---------------------------------------------------------------------------

/// Configuration for sitemap fetching.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Timeout for the HTTP request in seconds.
    pub timeout_secs: u64,
    /// Stop collecting URLs once this many have been parsed.
    pub page_limit: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            page_limit: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Fetch a sitemap and return the page URLs it lists, capped at the limit.
///
/// A transport failure, a non-success status, or an empty body all yield an
/// empty list rather than an error — the crawl simply has nothing to seed
/// from the sitemap (the priority URL, if any, is still crawled).
#[instrument(skip_all, fields(sitemap = %sitemap_url))]
pub async fn fetch_sitemap(sitemap_url: &Url, opts: &DiscoveryOptions) -> Result<Vec<String>> {
    let client = build_client(opts)?;

    let response = match client.get(sitemap_url.as_str()).send().await {
        Ok(resp) => resp,
        Err(e) => {
            debug!(error = %e, "sitemap fetch failed");
            return Ok(Vec::new());
        }
    };

    if !response.status().is_success() {
        debug!(status = %response.status(), "sitemap fetch returned non-success");
        return Ok(Vec::new());
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e, "failed to read sitemap body");
            return Ok(Vec::new());
        }
    };

    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let urls = parser::parse_sitemap(&body, opts.page_limit);
    info!(count = urls.len(), "sitemap parsed");
    Ok(urls)
}

/// Build a reqwest client with appropriate settings.
fn build_client(opts: &DiscoveryOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| SiteAssistError::Network(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/</loc></url>
  <url><loc>https://example.com/about</loc></url>
  <url><loc>https://example.com/pricing</loc></url>
</urlset>"#;

    #[tokio::test]
    async fn fetch_and_parse() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/sitemap.xml"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(SITEMAP))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/sitemap.xml", server.uri())).unwrap();
        let urls = fetch_sitemap(&url, &DiscoveryOptions::default()).await.unwrap();

        assert_eq!(urls.len(), 3);
        assert_eq!(urls[0], "https://example.com/");
    }

    #[tokio::test]
    async fn missing_sitemap_yields_empty() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/sitemap.xml"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/sitemap.xml", server.uri())).unwrap();
        let urls = fetch_sitemap(&url, &DiscoveryOptions::default()).await.unwrap();
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn limit_applies_during_fetch() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/sitemap.xml"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(SITEMAP))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/sitemap.xml", server.uri())).unwrap();
        let opts = DiscoveryOptions {
            page_limit: 2,
            ..Default::default()
        };
        let urls = fetch_sitemap(&url, &opts).await.unwrap();
        assert_eq!(urls.len(), 2);
    }
}
