//! thoughtlink - share chat-page thoughts with a local collective service
//!
//! Usage:
//!   thoughtlink run --page snap.html --url https://chatgpt.com/c/abc   → watch + sync
//!   thoughtlink run ... --offline                                     → in-process service
//!   thoughtlink extract --page snap.html --url ...                    → print messages
//!   thoughtlink status | clear | platforms
//!   thoughtlink config set --level 3 --anonymous true

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thoughtlink::Pipeline;
use thoughtlink_adapters::{AdapterRegistry, PageSnapshot};
use thoughtlink_core::{ContributionLevel, FilterSensitivity};
use thoughtlink_monitor::{AgentSettings, FileInjector, PageWatcher};
use thoughtlink_store::StateStore;
use thoughtlink_sync::{CollectiveTransport, HttpTransport, MockTransport};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "thoughtlink",
    about = "Extract chat-page conversations and sync them with a local collective service",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to agent settings (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to a file (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Print the default settings as TOML and exit
    #[arg(long, default_value_t = false)]
    dump_config: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a page snapshot file and run the full pipeline
    Run {
        /// HTML snapshot, rewritten by the embedder on every page mutation
        #[arg(short, long)]
        page: PathBuf,
        /// URL of the page the snapshot came from
        #[arg(short, long)]
        url: String,
        /// Override the service address from settings
        #[arg(long)]
        service: Option<String>,
        /// Use an in-process service that accepts everything
        #[arg(long, default_value_t = false)]
        offline: bool,
    },
    /// Print the messages extracted from one snapshot as JSON
    Extract {
        #[arg(short, long)]
        page: PathBuf,
        #[arg(short, long)]
        url: String,
    },
    /// Show cursors, queue, connection state and sharing config
    Status,
    /// Sharing configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Clear cursors, shared ledger and queue
    Clear,
    /// List the hostname → platform table
    Platforms,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current sharing configuration
    Show,
    /// Update sharing configuration fields
    Set {
        /// Contribution level, 1 (least) to 5 (everything)
        #[arg(long)]
        level: Option<u8>,
        #[arg(long)]
        anonymous: Option<bool>,
        #[arg(long)]
        auto_share: Option<bool>,
        /// low, medium or high
        #[arg(long)]
        sensitivity: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.dump_config {
        print!("{}", AgentSettings::default().to_toml());
        return Ok(());
    }

    let _guard = init_tracing(cli.log_file.as_deref())?;
    let config_path = cli.config.clone().unwrap_or_else(AgentSettings::default_path);
    let settings = AgentSettings::load(&config_path);

    match cli.command {
        Some(Commands::Run {
            page,
            url,
            service,
            offline,
        }) => run(settings, page, url, service, offline).await?,
        Some(Commands::Extract { page, url }) => extract(&page, &url)?,
        Some(Commands::Status) => status(&settings)?,
        Some(Commands::Config { action }) => config(&settings, action)?,
        Some(Commands::Clear) => {
            let store = open_store(&settings);
            let dropped = store.queue_len();
            store.clear();
            println!("Cleared state ({} queued record(s) dropped)", dropped);
        }
        Some(Commands::Platforms) => platforms()?,
        None => {
            println!("thoughtlink v{}", env!("CARGO_PKG_VERSION"));
            println!("Run `thoughtlink --help` for usage.");
        }
    }

    Ok(())
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "thoughtlink=info".into());
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let Some(path) = log_file else {
        tracing_subscriber::registry().with(filter).with(stderr).init();
        return Ok(None);
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).with_context(|| format!("creating log directory {}", dir.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "thoughtlink.log".into());
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

fn open_store(settings: &AgentSettings) -> StateStore {
    StateStore::open(&settings.paths.state_dir)
}

async fn run(
    mut settings: AgentSettings,
    page: PathBuf,
    url: String,
    service: Option<String>,
    offline: bool,
) -> anyhow::Result<()> {
    if let Some(addr) = service {
        settings.service.address = addr;
    }

    let transport: Arc<dyn CollectiveTransport> = if offline {
        Arc::new(MockTransport::new())
    } else {
        Arc::new(HttpTransport::new(&settings.service.address)?)
    };

    let injection_dir = settings.paths.injection_dir.clone();
    let poll = settings.poll_interval();
    let pipeline = Pipeline::new(settings)?;
    if !pipeline.store().is_durable() {
        tracing::warn!("State store is memory-only; progress will not survive a restart");
    }
    let platform = pipeline.registry().platform_for(&url);
    tracing::info!("Watching {} as {} ({})", page.display(), url, platform);

    let subscription = PageWatcher::new(&page, &url, poll).spawn(16);
    let running = pipeline.start(transport, subscription, FileInjector::new(&injection_dir))?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupted, shutting down");

    let report = running.shutdown().await;
    println!(
        "Handed off {} message(s) in {} extraction(s); {} insight(s) injected; {} record(s) still queued",
        report.monitor.messages_handed_off,
        report.monitor.extractions,
        report.insights_injected,
        report.queue_remaining
    );
    Ok(())
}

fn extract(page: &Path, url: &str) -> anyhow::Result<()> {
    let html = std::fs::read_to_string(page).with_context(|| format!("reading {}", page.display()))?;
    let registry = AdapterRegistry::with_defaults()?;
    let messages = registry.extract(&PageSnapshot::new(url, html));
    println!("{}", serde_json::to_string_pretty(&messages)?);
    Ok(())
}

fn status(settings: &AgentSettings) -> anyhow::Result<()> {
    let store = open_store(settings);
    let state = store.snapshot();
    let location = store
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "memory only".to_string());

    println!("State:       {}", location);
    println!("Service:     {}", settings.service.address);
    println!("Connection:  {}", state.connection_state);
    println!("Queued:      {}", state.queue.len());
    println!("Config:      {}", serde_json::to_string(&state.config)?);
    println!("Cursors:");
    if state.cursors.is_empty() {
        println!("  (none)");
    }
    for (conversation, cursor) in &state.cursors {
        let shared = state.shared.get(conversation).map(|s| s.len()).unwrap_or(0);
        println!(
            "  {}  position={} last={} shared={} updated={}",
            conversation,
            cursor.position,
            cursor.last_message_id.as_deref().unwrap_or("-"),
            shared,
            cursor.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

fn config(settings: &AgentSettings, action: ConfigAction) -> anyhow::Result<()> {
    let store = open_store(settings);
    let mut share = store.config();
    if let ConfigAction::Set {
        level,
        anonymous,
        auto_share,
        sensitivity,
    } = action
    {
        if let Some(level) = level {
            share.contribution_level = ContributionLevel::new(level)?;
        }
        if let Some(anonymous) = anonymous {
            share.anonymous_mode = anonymous;
        }
        if let Some(auto_share) = auto_share {
            share.auto_share = auto_share;
        }
        if let Some(sensitivity) = sensitivity {
            share.filter_sensitivity = sensitivity.parse::<FilterSensitivity>()?;
        }
        store.set_config(share.clone());
        tracing::info!("Sharing config updated");
    }
    println!("{}", serde_json::to_string_pretty(&share)?);
    Ok(())
}

fn platforms() -> anyhow::Result<()> {
    let registry = AdapterRegistry::with_defaults()?;
    for (pattern, platform) in registry.routes() {
        println!("{:<24} {}", pattern, platform);
    }
    Ok(())
}
