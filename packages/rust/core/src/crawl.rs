//! Crawl orchestration: sitemap → extraction → chunks, under global caps.
//!
//! One synchronous operator action. Per-URL failures are skipped; the only
//! early exit is the global chunk cap, which aborts the whole run the moment
//! it is reached — even mid-document.

use chrono::Utc;
use siteassist_discovery::{DiscoveryOptions, fetch_sitemap};
use siteassist_extract::{PageExtractor, sha256_hex};
use siteassist_shared::{
    AppConfig, ChunkRecord, DocStatus, DocumentRecord, Result, SiteAssistError,
};
use siteassist_storage::Storage;
use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

use crate::chunker::chunk_text;

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting crawl status.
pub trait CrawlProgress: Send + Sync {
    /// Called after each document is indexed.
    fn page_indexed(&self, url: &str, indexed: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl CrawlProgress for SilentProgress {
    fn page_indexed(&self, _url: &str, _indexed: usize, _total: usize) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The crawl pipeline, parameterized by configuration and a store handle.
pub struct CrawlPipeline {
    site_url: Url,
    sitemap_url: Option<Url>,
    priority_url: Option<Url>,
    max_pages: usize,
    max_chunks: usize,
    chunk_chars: usize,
    chunk_overlap: usize,
    extractor: PageExtractor,
}

impl CrawlPipeline {
    /// Build a pipeline from the application config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let site_url = Url::parse(&config.site.site_url).map_err(|e| {
            SiteAssistError::config(format!(
                "invalid site_url '{}': {e}",
                config.site.site_url
            ))
        })?;

        let sitemap_url = match config.site.sitemap_url.trim() {
            "" => None,
            raw => Some(Url::parse(raw).map_err(|e| {
                SiteAssistError::config(format!("invalid sitemap_url '{raw}': {e}"))
            })?),
        };

        let priority_url = match config.site.priority_url.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(Url::parse(raw).map_err(|e| {
                SiteAssistError::config(format!("invalid priority_url '{raw}': {e}"))
            })?),
        };

        let extractor = PageExtractor::new(&site_url)?;

        Ok(Self {
            site_url,
            sitemap_url,
            priority_url,
            max_pages: config.kb.max_pages,
            max_chunks: config.kb.max_chunks,
            chunk_chars: config.kb.chunk_chars,
            chunk_overlap: config.kb.chunk_overlap,
            extractor,
        })
    }

    /// Run one crawl. Returns the number of documents (re)indexed.
    #[instrument(skip_all, fields(site = %self.site_url))]
    pub async fn run(&self, storage: &Storage, progress: &dyn CrawlProgress) -> Result<usize> {
        let urls = self.seed_urls().await?;
        info!(seeds = urls.len(), "starting crawl");

        let mut indexed = 0usize;

        'urls: for url in &urls {
            let page = match self.extractor.extract(url).await {
                Ok(page) => page,
                Err(reason) => {
                    debug!(%url, %reason, "skipping url");
                    continue;
                }
            };

            let is_priority = self
                .priority_url
                .as_ref()
                .is_some_and(|p| p.as_str() == url.as_str());

            let url_hash = sha256_hex(url.as_str());
            let now = Utc::now();

            // Re-crawls update the existing row and replace its chunks
            // wholesale; priority can only ratchet up.
            let doc_id = match storage.find_document(&url_hash).await? {
                Some(existing) => {
                    let updated = DocumentRecord {
                        title: page.title.clone(),
                        content_hash: page.content_hash.clone(),
                        last_crawled: now,
                        priority: existing.priority || is_priority,
                        status: DocStatus::Indexed,
                        error: None,
                        ..existing
                    };
                    storage.update_document(&updated).await?;
                    storage.delete_chunks_for_document(&updated.id).await?;
                    updated.id
                }
                None => {
                    let doc = DocumentRecord {
                        id: Uuid::now_v7().to_string(),
                        url: url.to_string(),
                        url_hash,
                        title: page.title.clone(),
                        content_hash: page.content_hash.clone(),
                        last_crawled: now,
                        priority: is_priority,
                        status: DocStatus::Indexed,
                        error: None,
                    };
                    storage.insert_document(&doc).await?;
                    doc.id
                }
            };

            // The document counts as indexed from here on, even if the chunk
            // cap interrupts its chunks below.
            indexed += 1;
            progress.page_indexed(url.as_str(), indexed, urls.len());

            for chunk in chunk_text(&page.text, self.chunk_chars, self.chunk_overlap) {
                if storage.count_chunks().await? >= self.max_chunks as u64 {
                    info!(indexed, "chunk cap reached, ending crawl early");
                    break 'urls;
                }

                storage
                    .insert_chunk(&ChunkRecord {
                        id: Uuid::now_v7().to_string(),
                        doc_id: doc_id.clone(),
                        chunk_index: chunk.index,
                        content: chunk.content,
                        embedding: None,
                        tokens: chunk.tokens,
                        created_at: now,
                    })
                    .await?;
            }
        }

        info!(indexed, "crawl finished");
        Ok(indexed)
    }

    /// Build the seed URL list: priority URL first, then sitemap entries,
    /// filtered to the site's own host, deduplicated in first-seen order,
    /// truncated to the page cap.
    async fn seed_urls(&self) -> Result<Vec<Url>> {
        let mut raw: Vec<String> = Vec::new();

        if let Some(priority) = &self.priority_url {
            raw.push(priority.to_string());
        }

        if let Some(sitemap) = &self.sitemap_url {
            let opts = DiscoveryOptions {
                page_limit: self.max_pages,
                ..Default::default()
            };
            raw.extend(fetch_sitemap(sitemap, &opts).await?);
        }

        let site_host = self.site_url.host_str().unwrap_or_default().to_lowercase();

        let mut seen = std::collections::HashSet::new();
        let mut urls = Vec::new();
        for candidate in raw {
            let Ok(url) = Url::parse(&candidate) else {
                debug!(%candidate, "unparseable seed url");
                continue;
            };
            let host = url.host_str().unwrap_or_default().to_lowercase();
            if host != site_host {
                debug!(%url, "dropping offsite seed");
                continue;
            }
            if urls.len() >= self.max_pages {
                break;
            }
            if seen.insert(url.as_str().to_string()) {
                urls.push(url);
            }
        }

        Ok(urls)
    }
}
