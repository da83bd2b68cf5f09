//! # Nudge: scheduled AI-written reminders
//!
//! Usage:
//!   nudge                        # Run the reminder loop
//!   nudge cache inspect          # Show what is queued
//!   nudge cache repair           # Drop invalid and duplicate entries
//!   nudge cache clean            # Show what re-cleaning queued messages would change
//!   nudge cache clean --yes      # Re-clean queued messages (backup kept)
//!   nudge cache clear --yes      # Empty the queue (backup kept)
//!   nudge generate               # Print one fresh message, without queuing it

mod app;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use nudge_core::NudgeConfig;
use nudge_core::traits::Generator;
use nudge_scheduler::{
    Collection, DebugChannel, JsonFileStore, MessageQueue, OccasionScheduler, WebhookTransport,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::app::{ReminderApp, preview};

#[derive(Parser)]
#[command(
    name = "nudge",
    version,
    about = "📚 Nudge: scheduled AI-written reminders delivered to a webhook"
)]
struct Cli {
    /// Config file (default: ~/.nudge/config.toml)
    #[arg(short, long, env = "NUDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the reminder loop (default)
    Run,
    /// Inspect or maintain the message cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Generate one message and print it
    Generate,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show queued messages and problems
    Inspect,
    /// Remove invalid and duplicate entries
    Repair,
    /// Re-run message cleanup over queued messages
    Clean {
        /// Save the cleaned queue (otherwise only report)
        #[arg(long)]
        yes: bool,
    },
    /// Remove every queued message
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(NudgeConfig::default_path);
    let config = NudgeConfig::load_from(&config_path)
        .with_context(|| format!("Cannot load {}", config_path.display()))?;

    let _log_guard = init_logging(&config, cli.verbose)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Cache { action } => cache_command(&config, action),
        Command::Generate => generate_once(&config).await,
    }
}

/// Console logging plus an optional daily log file. Keep the guard alive.
fn init_logging(
    config: &NudgeConfig,
    verbose: bool,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "nudge={level},nudge_core={level},nudge_providers={level},nudge_scheduler={level}"
        ))
    });

    let console = tracing_subscriber::fmt::layer().with_target(false);

    let (file, guard) = match &config.logging.log_dir {
        Some(dir) => {
            let dir = nudge_core::config::expand_path(dir);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Cannot create log dir {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(&dir, "nudge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
    Ok(guard)
}

fn open_queue(config: &NudgeConfig) -> Result<MessageQueue> {
    let store = JsonFileStore::new(&config.cache_dir())?;
    Ok(MessageQueue::new(store))
}

async fn run(config: NudgeConfig) -> Result<()> {
    config.validate()?;

    tracing::info!("{}", "=".repeat(60));
    tracing::info!("📚 Nudge starting");
    tracing::info!("{}", "=".repeat(60));

    let generator = nudge_providers::create_client(&config.llm)?;
    tracing::info!(
        "🤖 Provider: {} (model {})",
        generator.name(),
        generator.model()
    );
    let transport = WebhookTransport::new("main", &config.webhook.main_url);
    let queue = open_queue(&config)?;
    let scheduler = OccasionScheduler::from_config(&config.reminder)?;
    let debug = DebugChannel::from_config(&config);
    if debug.is_enabled() {
        tracing::info!("🐞 Debug webhook enabled (level: {})", config.webhook.debug_level);
    }

    let mut app = ReminderApp::new(config, generator, transport, queue, scheduler, debug);
    app.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("❌ Cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await
}

fn cache_command(config: &NudgeConfig, action: CacheAction) -> Result<()> {
    let store = JsonFileStore::new(&config.cache_dir())?;
    let pending_path = store.path_for(Collection::Pending);
    let queue = MessageQueue::new(store);

    match action {
        CacheAction::Inspect => {
            let report = queue.inspect()?;
            println!("📦 Cache: {}", pending_path.display());
            println!("   Total:    {}", report.total);
            println!("   Valid:    {}", report.valid);
            println!("   Invalid:  {}", report.invalid);
            println!("   Empty:    {}", report.empty);
            println!("   Repeated: {}", report.duplicates);
            for (i, issue) in &report.issues {
                println!("   ⚠️  entry {i}: {issue}");
            }
            println!();
            for (i, entry) in report.entries.iter().enumerate() {
                println!(
                    "{:>3}. [{}] {}",
                    i + 1,
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    preview(&entry.text, 100)
                );
            }
        }
        CacheAction::Repair => {
            let report = queue.inspect()?;
            if report.issues.is_empty() && report.duplicates == 0 {
                println!("✅ Cache is valid ({} messages)", report.valid);
                return Ok(());
            }
            if let Some(backup) = queue.store().backup(Collection::Pending)? {
                println!("💾 Backup: {}", backup.display());
            }
            let removed = queue.validate_and_repair()?;
            println!("🩹 Removed {removed} entries, {} remain", queue.count());
        }
        CacheAction::Clean { yes } => {
            let plan = queue.resanitize_preview(nudge_providers::clean_message);
            if !plan.changed() {
                println!("✅ All {} messages are already clean", plan.kept);
                return Ok(());
            }
            println!(
                "🧹 {} to rewrite, {} to remove, {} would remain",
                plan.rewritten, plan.removed, plan.kept
            );
            if !yes {
                println!("   Run again with --yes to save the changes");
                return Ok(());
            }
            if let Some(backup) = queue.store().backup(Collection::Pending)? {
                println!("💾 Backup: {}", backup.display());
            }
            let done = queue.resanitize(nudge_providers::clean_message)?;
            println!(
                "✅ Rewrote {}, removed {}, {} remain",
                done.rewritten, done.removed, done.kept
            );
        }
        CacheAction::Clear { yes } => {
            if !yes {
                bail!("Refusing to clear the cache without --yes");
            }
            if let Some(backup) = queue.store().backup(Collection::Pending)? {
                println!("💾 Backup: {}", backup.display());
            }
            let removed = queue.clear()?;
            println!("🗑️ Removed {removed} messages");
        }
    }
    Ok(())
}

async fn generate_once(config: &NudgeConfig) -> Result<()> {
    let client = nudge_providers::create_client(&config.llm)?;
    let recent = open_queue(config)?.recent_sent_for_context(config.cache.context_messages);
    let prompt = config.render_prompt(&recent);
    match client.generate(&prompt).await? {
        Some(message) => {
            println!("{message}");
            Ok(())
        }
        None => bail!("{} returned no usable message", client.name()),
    }
}
