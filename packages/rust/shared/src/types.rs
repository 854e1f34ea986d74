//! Core domain types for the SiteAssist knowledge base.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bot name used for robots.txt matching.
pub const BOT_NAME: &str = "SiteAssistBot";

/// User-Agent string for all outbound requests.
pub const USER_AGENT: &str = concat!("SiteAssistBot/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// DocStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of an indexed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStatus {
    /// Created but not yet successfully indexed.
    New,
    /// Crawled and chunked.
    Indexed,
    /// Last crawl attempt failed.
    Error,
}

impl DocStatus {
    /// Stable string form stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Indexed => "indexed",
            Self::Error => "error",
        }
    }

    /// Parse the stored string form. Unknown values map to `New`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "indexed" => Self::Indexed,
            "error" => Self::Error,
            _ => Self::New,
        }
    }
}

impl std::fmt::Display for DocStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DocumentRecord
// ---------------------------------------------------------------------------

/// One crawled, deduplicated web page tracked by URL fingerprint.
///
/// Re-crawling a URL updates the same row (keyed by `url_hash`) and replaces
/// its chunks wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Unique document identifier (UUID v7).
    pub id: String,
    /// Original page URL.
    pub url: String,
    /// SHA-256 fingerprint of the URL, unique across documents.
    pub url_hash: String,
    /// Display title (falls back to the URL when the page has no `<title>`).
    pub title: String,
    /// SHA-256 fingerprint of the extracted text, for change detection.
    pub content_hash: String,
    /// When the page was last crawled.
    pub last_crawled: DateTime<Utc>,
    /// Elevated for the operator-designated priority URL; wins retrieval ties.
    pub priority: bool,
    /// Lifecycle status.
    pub status: DocStatus,
    /// Last error message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// ChunkRecord
// ---------------------------------------------------------------------------

/// A bounded-length slice of a document's extracted text — the unit of
/// embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique chunk identifier (UUID v7).
    pub id: String,
    /// Owning document.
    pub doc_id: String,
    /// 0-based, contiguous ordinal within the document.
    pub chunk_index: u32,
    /// Chunk text content.
    pub content: String,
    /// Embedding vector; `None` until the batcher fills it in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Approximate token count: `ceil(chars / 4)`.
    pub tokens: u32,
    /// When the chunk row was created.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Retrieval results
// ---------------------------------------------------------------------------

/// A distinct source page contributing to a retrieval result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Document title.
    pub title: String,
    /// Document URL.
    pub url: String,
}

/// Ranked context returned by the retriever.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievedContext {
    /// Top-k chunk texts joined with a delimiter, empty when nothing matched.
    pub context: String,
    /// Distinct source pages in rank order, deduplicated by URL.
    pub sources: Vec<SourceRef>,
}

impl RetrievedContext {
    /// The empty result used for graceful degradation.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether any grounding context was found.
    pub fn is_empty(&self) -> bool {
        self.context.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_string_roundtrip() {
        for status in [DocStatus::New, DocStatus::Indexed, DocStatus::Error] {
            assert_eq!(DocStatus::from_str_lossy(status.as_str()), status);
        }
        assert_eq!(DocStatus::from_str_lossy("garbage"), DocStatus::New);
    }

    #[test]
    fn document_serialization() {
        let doc = DocumentRecord {
            id: "0192f0c1-0000-7000-8000-000000000000".into(),
            url: "https://example.com/about".into(),
            url_hash: "ab".repeat(32),
            title: "About".into(),
            content_hash: "cd".repeat(32),
            last_crawled: Utc::now(),
            priority: false,
            status: DocStatus::Indexed,
            error: None,
        };

        let json = serde_json::to_string(&doc).expect("serialize");
        let parsed: DocumentRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.status, DocStatus::Indexed);
        assert_eq!(parsed.title, "About");
    }

    #[test]
    fn empty_retrieval_context() {
        let ctx = RetrievedContext::empty();
        assert!(ctx.is_empty());
        assert!(ctx.sources.is_empty());
    }
}
