//! Application configuration for SiteAssist.
//!
//! User config lives at `~/.siteassist/siteassist.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiteAssistError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "siteassist.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".siteassist";

// ---------------------------------------------------------------------------
// Config structs (matching siteassist.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// The site this knowledge base belongs to.
    #[serde(default)]
    pub site: SiteConfig,

    /// OpenAI settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Knowledge-base caps and chunking parameters.
    #[serde(default)]
    pub kb: KbConfig,
}

/// `[site]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// The site's own base URL. Only URLs on this host are crawled.
    #[serde(default)]
    pub site_url: String,

    /// Absolute URL of the sitemap to crawl.
    #[serde(default)]
    pub sitemap_url: String,

    /// Optional single priority URL, crawled first and tie-break-favored
    /// during retrieval.
    #[serde(default)]
    pub priority_url: Option<String>,
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Embedding model for chunks and queries. Must stay fixed for the life
    /// of the index: vectors from different models are not comparable.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Chat model used for answer composition.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Display name the assistant answers as.
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            embedding_model: default_embedding_model(),
            chat_model: default_chat_model(),
            assistant_name: default_assistant_name(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_chat_model() -> String {
    "gpt-4o-mini".into()
}
fn default_assistant_name() -> String {
    "Assistant".into()
}

/// `[kb]` section — hard caps and chunking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbConfig {
    /// Maximum documents in the corpus. The crawl seed list is truncated here.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Maximum chunks across the whole corpus. A hard stop: crawling aborts
    /// the moment this is reached, even mid-document.
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,

    /// Target chunk size in characters.
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,

    /// Characters of trailing context shared between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Number of chunks returned by retrieval.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Database file path. Defaults to `<config dir>/siteassist.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            max_chunks: default_max_chunks(),
            chunk_chars: default_chunk_chars(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            db_path: None,
        }
    }
}

fn default_max_pages() -> usize {
    50
}
fn default_max_chunks() -> usize {
    300
}
fn default_chunk_chars() -> usize {
    3600
}
fn default_chunk_overlap() -> usize {
    600
}
fn default_top_k() -> usize {
    3
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.siteassist/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SiteAssistError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.siteassist/siteassist.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SiteAssistError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SiteAssistError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SiteAssistError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SiteAssistError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SiteAssistError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Look up the OpenAI API key from the configured env var.
///
/// Returns `None` when the variable is unset or empty — callers that can
/// degrade gracefully (embedding, retrieval) treat that as "no provider".
pub fn resolve_api_key(config: &AppConfig) -> Option<String> {
    match std::env::var(&config.openai.api_key_env) {
        Ok(val) if !val.trim().is_empty() => Some(val.trim().to_string()),
        _ => None,
    }
}
