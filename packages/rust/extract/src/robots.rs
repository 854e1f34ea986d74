//! Simplified robots.txt handling with a per-host TTL cache.
//!
//! Deliberately not a full robots.txt implementation: only `User-agent: *`
//! blocks (or blocks naming this bot) are honored, and `Disallow` rules are
//! plain path-prefix matches. No `Allow` overrides, no wildcards, no `$`
//! anchors. The surrounding crawl is bounded and same-host only, so the
//! simplified semantics are preserved on purpose.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::Client;
use siteassist_shared::BOT_NAME;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

/// How long fetched rules stay valid per host.
pub const ROBOTS_TTL: Duration = Duration::from_secs(60 * 60);

/// Timeout for fetching robots.txt itself.
const ROBOTS_TIMEOUT: Duration = Duration::from_secs(8);

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Disallow rules applicable to this bot, parsed from one robots.txt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsRules {
    /// Path prefixes this bot must not fetch.
    disallow: Vec<String>,
}

impl RobotsRules {
    /// Parse a robots.txt body, keeping only rules addressed to `*` or to
    /// this bot by name.
    pub fn parse(body: &str) -> Self {
        let mut disallow = Vec::new();
        let mut applies = false;

        for line in body.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(agent) = strip_directive(line, "user-agent:") {
                applies = agent == "*" || agent.eq_ignore_ascii_case(BOT_NAME);
            } else if applies {
                if let Some(path) = strip_directive(line, "disallow:") {
                    if !path.is_empty() {
                        disallow.push(path.to_string());
                    }
                }
            }
        }

        Self { disallow }
    }

    /// Whether this bot may fetch the given path.
    pub fn allows(&self, path: &str) -> bool {
        let path = if path.is_empty() { "/" } else { path };
        for rule in &self.disallow {
            if rule == "/" {
                // Everything blocked
                return false;
            }
            if path.starts_with(rule.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Case-insensitive directive prefix match; returns the trimmed value.
fn strip_directive<'a>(line: &'a str, directive: &str) -> Option<&'a str> {
    let head = line.get(..directive.len())?;
    if head.eq_ignore_ascii_case(directive) {
        Some(line[directive.len()..].trim())
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

struct CachedRules {
    fetched_at: Instant,
    rules: RobotsRules,
}

/// Per-host robots.txt cache, fetched lazily and kept for [`ROBOTS_TTL`].
pub struct RobotsCache {
    client: Client,
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedRules>>,
}

impl RobotsCache {
    /// Create a cache backed by the given client.
    pub fn new(client: Client) -> Self {
        Self::with_ttl(client, ROBOTS_TTL)
    }

    /// Create a cache with a custom TTL (used by expiry tests).
    pub fn with_ttl(client: Client, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Whether robots rules allow fetching `url`.
    ///
    /// A URL without a host is refused. A robots.txt that cannot be fetched
    /// (transport error or non-200) caches an empty rule set, i.e. allows
    /// everything for the TTL window.
    pub async fn allows(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let origin = format!("{}://{}", url.scheme(), host.to_lowercase());

        let mut entries = self.entries.lock().await;
        let stale = match entries.get(&origin) {
            Some(cached) => cached.fetched_at.elapsed() >= self.ttl,
            None => true,
        };

        if stale {
            let rules = self.fetch_rules(&origin).await;
            entries.insert(
                origin.clone(),
                CachedRules {
                    fetched_at: Instant::now(),
                    rules,
                },
            );
        }

        let rules = &entries.get(&origin).expect("just inserted").rules;
        rules.allows(url.path())
    }

    async fn fetch_rules(&self, origin: &str) -> RobotsRules {
        let robots_url = format!("{origin}/robots.txt");

        let response = self
            .client
            .get(&robots_url)
            .timeout(ROBOTS_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => RobotsRules::parse(&body),
                Err(e) => {
                    debug!(%robots_url, error = %e, "failed to read robots.txt body");
                    RobotsRules::default()
                }
            },
            Ok(resp) => {
                debug!(%robots_url, status = %resp.status(), "no usable robots.txt");
                RobotsRules::default()
            }
            Err(e) => {
                debug!(%robots_url, error = %e, "robots.txt fetch failed");
                RobotsRules::default()
            }
        }
    }
}
