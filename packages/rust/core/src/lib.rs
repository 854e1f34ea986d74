//! SiteAssist core pipelines: chunking, crawling, embedding, retrieval, and
//! assistant answer composition.
//!
//! Every pipeline is a plain service parameterized by configuration and a
//! [`siteassist_storage::Storage`] handle — no globals, no lazy singletons —
//! so each operation is deterministic under test. The operator-facing
//! actions map onto:
//!
//! - `install` — [`siteassist_storage::Storage::open`] (migrations run on open)
//! - `crawl` — [`crawl::CrawlPipeline::run`]
//! - `embed` — [`embed::embed_pending`]
//! - `retrieve`/`ask` — [`retrieval::retrieve_top_k`], [`assistant::answer`]
//! - `purge` — [`siteassist_storage::Storage::purge_all`]

pub mod assistant;
pub mod chunker;
pub mod crawl;
pub mod embed;
pub mod retrieval;

pub use assistant::{Answer, AssistantConfig};
pub use chunker::{Chunk, chunk_text};
pub use crawl::{CrawlPipeline, CrawlProgress, SilentProgress};
pub use embed::embed_pending;
pub use retrieval::{CONTEXT_DELIMITER, cosine_similarity, retrieve_top_k};
