//! Shared types, error model, and configuration for SiteAssist.
//!
//! This crate is the foundation depended on by all other SiteAssist crates.
//! It provides:
//! - [`SiteAssistError`] — the unified error type
//! - Domain types ([`DocumentRecord`], [`ChunkRecord`], [`RetrievedContext`])
//! - Configuration ([`AppConfig`], [`KbConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, KbConfig, OpenAiConfig, SiteConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from, resolve_api_key,
};
pub use error::{Result, SiteAssistError};
pub use types::{
    BOT_NAME, ChunkRecord, DocStatus, DocumentRecord, RetrievedContext, SourceRef, USER_AGENT,
};
