//! ttx-gather - multi-language talk transcript gatherer
//!
//! `discover` walks the talk listing and records which transcript languages
//! each talk offers. `gather` collects every required language of each talk
//! and appends one record per completed talk to the output file, resuming
//! from whatever an earlier run already wrote.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ttx_common::config::{CompletionBudget, LoggingConfig, TomlConfig, DEFAULT_CONCURRENCY, DEFAULT_DISCOVERED};
use ttx_common::events::{EventBus, GatherEvent};
use ttx_gather::remote::{HttpFetcher, HttpFetcherConfig, TedDecoder};
use ttx_gather::{CatalogDiscovery, ConfigOverrides, GatherSession, GatherSettings};

/// Log a progress line every this many completions
const PROGRESS_INTERVAL: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "ttx-gather")]
#[command(about = "Gather multi-language talk transcripts")]
#[command(version)]
struct Args {
    /// TOML config file (defaults to $TTX_CONFIG, then the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect transcripts for every admitted talk
    Gather(GatherArgs),
    /// Walk the talk listing and record each talk's languages
    Discover(DiscoverArgs),
}

#[derive(clap::Args, Debug)]
struct GatherArgs {
    /// Required languages, comma-separated (e.g. "en,fr")
    #[arg(short, long, env = "TTX_LANGUAGES")]
    languages: Option<String>,

    /// Explicit talk ids or slugs; overrides any catalog
    #[arg(long = "id", value_delimiter = ',', env = "TTX_IDS")]
    ids: Vec<String>,

    /// Explicit catalog (.csv with a name or id column, or JSON lines)
    #[arg(short, long, env = "TTX_INPUT")]
    input: Option<PathBuf>,

    /// Discovered-talks file, used when no ids or catalog are given
    #[arg(long, env = "TTX_DISCOVERED")]
    discovered: Option<PathBuf>,

    /// Output file; also the completion ledger
    #[arg(short, long, env = "TTX_OUTPUT")]
    output: Option<PathBuf>,

    /// Skip log (defaults to <output>.skipped.jsonl)
    #[arg(long, env = "TTX_SKIP_LOG")]
    skip_log: Option<PathBuf>,

    /// Retries per language before a talk is abandoned
    #[arg(long, env = "TTX_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Stop admitting once this many talks are completed (or "unbounded")
    #[arg(long, env = "TTX_MAX_TALKS")]
    max_talks: Option<CompletionBudget>,

    /// Talks processed concurrently
    #[arg(long, env = "TTX_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Check previously skipped talks again
    #[arg(long, env = "TTX_RECHECK_SKIPPED")]
    recheck_skipped: bool,
}

impl From<GatherArgs> for ConfigOverrides {
    fn from(args: GatherArgs) -> Self {
        Self {
            languages: args.languages,
            max_retries: args.max_retries,
            max_talks: args.max_talks,
            concurrency: args.concurrency,
            output: args.output,
            skip_log: args.skip_log,
            input: args.input,
            discovered: args.discovered,
            ids: args.ids,
            recheck_skipped: args.recheck_skipped,
        }
    }
}

#[derive(clap::Args, Debug)]
struct DiscoverArgs {
    /// Discovered-talks output file
    #[arg(short, long, env = "TTX_DISCOVERED")]
    output: Option<PathBuf>,

    /// Talk pages fetched concurrently
    #[arg(long, env = "TTX_CONCURRENCY")]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = TomlConfig::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&toml_config.logging)?;

    info!("Starting ttx-gather v{}", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    match args.command {
        Command::Gather(gather_args) => run_gather(gather_args.into(), &toml_config, cancel).await,
        Command::Discover(discover_args) => run_discover(discover_args, &toml_config, cancel).await,
    }
}

async fn run_gather(overrides: ConfigOverrides, toml_config: &TomlConfig, cancel: CancellationToken) -> Result<()> {
    let settings = GatherSettings::resolve(overrides, toml_config).context("Invalid gather settings")?;
    let source = settings.work_source().context("Failed to open work source")?;

    let fetcher = Arc::new(HttpFetcher::new(settings.remote.clone()).context("Failed to build HTTP client")?);
    let event_bus = EventBus::new(256);
    spawn_progress_logger(&event_bus);

    let session = GatherSession::open(settings, fetcher, Arc::new(TedDecoder::new()), event_bus)
        .await
        .context("Failed to open ledger")?;

    let summary = session.run(source, cancel).await;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn run_discover(args: DiscoverArgs, toml_config: &TomlConfig, cancel: CancellationToken) -> Result<()> {
    let output = args
        .output
        .or_else(|| toml_config.gather.discovered.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DISCOVERED));
    let concurrency = args
        .concurrency
        .or(toml_config.gather.concurrency)
        .unwrap_or(DEFAULT_CONCURRENCY);

    let fetcher = HttpFetcher::new(HttpFetcherConfig::from_section(&toml_config.remote))
        .context("Failed to build HTTP client")?;
    let discovery = CatalogDiscovery::new(Arc::new(fetcher), Arc::new(TedDecoder::new()), &output, concurrency);

    let summary = discovery.run(cancel).await.context("Catalog discovery failed")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// `RUST_LOG` wins over the configured level; logs go to the configured
/// file when set, stderr otherwise
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(std::sync::Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight talks");
            cancel.cancel();
        }
    });
}

fn spawn_progress_logger(event_bus: &EventBus) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        let mut completed = 0usize;
        loop {
            match rx.recv().await {
                Ok(GatherEvent::ItemCompleted { total_completed, .. }) => {
                    completed += 1;
                    if completed % PROGRESS_INTERVAL == 0 {
                        info!(this_run = completed, total = total_completed, "Progress");
                    }
                }
                Ok(GatherEvent::SessionFinished { .. }) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Progress logger fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
