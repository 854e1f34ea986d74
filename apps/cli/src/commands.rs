//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use siteassist_core::{AssistantConfig, CrawlPipeline, CrawlProgress, SilentProgress};
use siteassist_openai::OpenAiClient;
use siteassist_shared::{AppConfig, config_dir, init_config, load_config, resolve_api_key};
use siteassist_storage::Storage;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SiteAssist — ground an AI assistant in your own website.
#[derive(Parser)]
#[command(
    name = "siteassist",
    version,
    about = "Crawl your site into a knowledge base and answer questions from it.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Create or upgrade the database schema.
    Install,

    /// Crawl the configured sitemap into the index.
    Crawl {
        /// Suppress the progress spinner.
        #[arg(long)]
        quiet: bool,
    },

    /// Generate embeddings for chunks that lack them.
    Embed {
        /// Maximum chunks to embed in this batch.
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Show the raw retrieval result for a query (debugging aid).
    Retrieve {
        /// Query text.
        query: String,

        /// Number of chunks to return.
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Ask the assistant a question grounded in the index.
    Ask {
        /// The question.
        question: String,
    },

    /// Delete every document and chunk from the index.
    Purge {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },

    /// Show index counts and embedding backlog.
    Status,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "siteassist=info",
        1 => "siteassist=debug",
        _ => "siteassist=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Install => cmd_install().await,
        Command::Crawl { quiet } => cmd_crawl(quiet).await,
        Command::Embed { limit } => cmd_embed(limit).await,
        Command::Retrieve { query, top_k } => cmd_retrieve(&query, top_k).await,
        Command::Ask { question } => cmd_ask(&question).await,
        Command::Purge { yes } => cmd_purge(yes).await,
        Command::Status => cmd_status().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Shared plumbing
// ---------------------------------------------------------------------------

/// Resolve the database path from config (default: `<config dir>/siteassist.db`).
fn db_path(config: &AppConfig) -> Result<PathBuf> {
    match &config.kb.db_path {
        Some(path) => Ok(PathBuf::from(path)),
        None => Ok(config_dir()?.join("siteassist.db")),
    }
}

/// Open the storage, creating/upgrading the schema as needed.
async fn open_storage(config: &AppConfig) -> Result<Storage> {
    let path = db_path(config)?;
    Ok(Storage::open(&path).await?)
}

/// Build the provider client when an API key is configured.
fn provider(config: &AppConfig) -> Result<Option<OpenAiClient>> {
    match resolve_api_key(config) {
        Some(key) => Ok(Some(OpenAiClient::new(
            &key,
            config.openai.embedding_model.clone(),
            config.openai.chat_model.clone(),
        )?)),
        None => Ok(None),
    }
}

fn assistant_config(config: &AppConfig) -> AssistantConfig {
    AssistantConfig {
        name: config.openai.assistant_name.clone(),
        top_k: config.kb.top_k,
        max_chunks: config.kb.max_chunks,
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_install() -> Result<()> {
    let config = load_config()?;
    let path = db_path(&config)?;
    let storage = open_storage(&config).await?;

    // Opening applies migrations; a quick count proves the schema is usable.
    let docs = storage.count_documents().await?;
    println!("  Schema ready at {}", path.display());
    println!("  Documents: {docs}");
    Ok(())
}

async fn cmd_crawl(quiet: bool) -> Result<()> {
    let config = load_config()?;
    if config.site.site_url.is_empty() {
        return Err(eyre!(
            "no site_url configured — run `siteassist config init` and edit the [site] section"
        ));
    }

    let storage = open_storage(&config).await?;
    let pipeline = CrawlPipeline::from_config(&config)?;

    info!(sitemap = %config.site.sitemap_url, "starting crawl");

    let indexed = if quiet {
        pipeline.run(&storage, &SilentProgress).await?
    } else {
        let progress = CliProgress::new("Crawling");
        let indexed = pipeline.run(&storage, &progress).await?;
        progress.finish();
        indexed
    };

    let chunks = storage.count_chunks().await?;
    println!();
    println!("  Crawl finished.");
    println!("  Documents indexed: {indexed}");
    println!("  Chunks stored:     {chunks}");
    println!();
    println!("  Run `siteassist embed` to generate embeddings.");
    Ok(())
}

async fn cmd_embed(limit: usize) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let provider = provider(&config)?;

    if provider.is_none() {
        println!(
            "  No API key found in ${} — nothing embedded.",
            config.openai.api_key_env
        );
        return Ok(());
    }

    let updated = siteassist_core::embed_pending(&storage, provider.as_ref(), limit).await?;
    let pending = storage.count_pending_chunks().await?;

    println!("  Embedded {updated} chunk(s); {pending} still pending.");
    if pending > 0 {
        println!("  Run `siteassist embed` again to continue.");
    }
    Ok(())
}

async fn cmd_retrieve(query: &str, top_k: Option<usize>) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let provider = provider(&config)?;
    let k = top_k.unwrap_or(config.kb.top_k);

    let result = siteassist_core::retrieve_top_k(
        &storage,
        provider.as_ref(),
        query,
        k,
        config.kb.max_chunks,
    )
    .await?;

    if result.is_empty() {
        println!("  (no context retrieved)");
        return Ok(());
    }

    println!("{}", result.context);
    println!();
    println!("  Sources:");
    for source in &result.sources {
        println!("  - {} <{}>", source.title, source.url);
    }
    Ok(())
}

async fn cmd_ask(question: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let provider = provider(&config)?;

    let result = siteassist_core::assistant::answer(
        &storage,
        provider.as_ref(),
        &assistant_config(&config),
        question,
    )
    .await?;

    println!("{}", result.answer);
    if !result.sources.is_empty() {
        println!();
        println!("  Sources:");
        for source in &result.sources {
            println!("  - {} <{}>", source.title, source.url);
        }
    }
    Ok(())
}

async fn cmd_purge(yes: bool) -> Result<()> {
    if !yes {
        return Err(eyre!("refusing to purge without --yes"));
    }

    let config = load_config()?;
    let storage = open_storage(&config).await?;
    storage.purge_all().await?;

    println!("  Index purged.");
    Ok(())
}

async fn cmd_status() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(&config).await?;

    let documents = storage.count_documents().await?;
    let chunks = storage.count_chunks().await?;
    let pending = storage.count_pending_chunks().await?;

    println!("  Documents: {documents} / {}", config.kb.max_pages);
    println!("  Chunks:    {chunks} / {}", config.kb.max_chunks);
    println!("  Pending embeddings: {pending}");
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("  Wrote {}", path.display());
    println!("  Edit the [site] section, then run `siteassist crawl`.");
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let rendered = toml::to_string_pretty(&config)?;
    println!("{rendered}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Crawl progress via an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new(label: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}").expect("valid template"),
        );
        spinner.set_message(label.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl CrawlProgress for CliProgress {
    fn page_indexed(&self, url: &str, indexed: usize, total: usize) {
        self.spinner.set_message(format!("[{indexed}/{total}] {url}"));
    }
}
