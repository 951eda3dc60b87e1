//! CLI binary for herald.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use herald::dispatch::DispatchEvent;
use herald::{
    DeliveryLedger, DispatchEngine, HeraldConfig, HeraldError, MessageTransport,
    UnconfiguredTransport, WhatsAppTransport, load_contacts,
};

/// Herald: scheduled outbound message dispatcher.
#[derive(Parser)]
#[command(name = "herald", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Run the campaign across the configured windows.
    Run {
        /// Rehearse the full schedule without sending or recording anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show per-status delivery counts from the ledger.
    Status,

    /// Re-arm failed recipients so the next run attempts them again.
    ResetFailed,

    /// Delete every ledger record, restarting the campaign from scratch.
    ResetAll,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("herald=info")),
        )
        .init();

    let cli = Cli::parse();

    // An explicit config path must exist; the default path bootstraps a
    // template file on first use.
    let config = if let Some(ref path) = cli.config {
        HeraldConfig::from_file(path)?
    } else {
        HeraldConfig::load_or_init()?
    };

    match cli.command {
        Command::Run { dry_run } => run_campaign(config, dry_run).await,
        Command::Status => show_status(&config),
        Command::ResetFailed => reset_failed(&config),
        Command::ResetAll => reset_all(&config),
    }
}

async fn run_campaign(config: HeraldConfig, dry_run: bool) -> anyhow::Result<()> {
    config.validate()?;

    let recipients = load_contacts(&config.contacts.file)?;
    if recipients.is_empty() {
        println!("Contact list is empty; nothing to do.");
        return Ok(());
    }

    let ledger = Arc::new(DeliveryLedger::open(&config.ledger.database_path)?);

    let transport: Arc<dyn MessageTransport> = match &config.whatsapp {
        Some(wa) => Arc::new(WhatsAppTransport::new(wa)),
        None if dry_run => Arc::new(UnconfiguredTransport),
        None => {
            return Err(HeraldError::Config(
                "no [whatsapp] section configured; a live run needs a transport \
                 (use --dry-run to rehearse without one)"
                    .to_owned(),
            )
            .into());
        }
    };

    let cancel = tokio_util::sync::CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, finishing up...");
            cancel_clone.cancel();
        }
    });

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let progress = tokio::spawn(render_progress(rx));

    let engine = DispatchEngine::new(
        ledger,
        transport,
        recipients,
        config.schedule.clone(),
        config.payload(),
    )
    .with_pacing(config.pacing())
    .with_cancellation(cancel)
    .with_events(tx);

    let report = engine.run(dry_run).await?;
    let _ = progress.await;

    if report.cancelled {
        println!("\nRun cancelled. The ledger keeps what was done; re-run to resume.");
    }
    println!(
        "\nWindows: {}  Delivered: {}  Failed: {}  Skipped: {}  Rehearsed: {}",
        report.windows_opened, report.delivered, report.failed, report.skipped, report.rehearsed
    );
    Ok(())
}

/// Render dispatch events as a per-window progress bar.
async fn render_progress(mut rx: tokio::sync::mpsc::UnboundedReceiver<DispatchEvent>) {
    let mut bar: Option<ProgressBar> = None;
    while let Some(event) = rx.recv().await {
        match event {
            DispatchEvent::WindowOpened {
                index,
                target,
                selected,
            } => {
                let pb = ProgressBar::new(selected as u64);
                if let Ok(style) = ProgressStyle::with_template(
                    "{msg}\n{bar:40.cyan/blue} {pos}/{len}",
                ) {
                    pb.set_style(style);
                }
                pb.set_message(format!(
                    "Window {} — {} recipients at {}",
                    index + 1,
                    selected,
                    target.format("%H:%M")
                ));
                bar = Some(pb);
            }
            DispatchEvent::Waiting { target, .. } => {
                if let Some(pb) = &bar {
                    pb.set_message(format!("Waiting until {}", target.format("%H:%M")));
                }
            }
            DispatchEvent::Jitter { recipient, secs } => {
                if let Some(pb) = &bar {
                    pb.set_message(format!("{recipient}: jitter {secs}s"));
                }
            }
            DispatchEvent::Delivered { recipient } => {
                if let Some(pb) = &bar {
                    pb.set_message(format!("{recipient}: delivered"));
                    pb.inc(1);
                }
            }
            DispatchEvent::SendFailed { recipient, reason } => {
                if let Some(pb) = &bar {
                    pb.set_message(format!("{recipient}: failed ({reason})"));
                    pb.inc(1);
                }
            }
            DispatchEvent::Rehearsed { recipient } => {
                if let Some(pb) = &bar {
                    pb.set_message(format!("{recipient}: dry run"));
                    pb.inc(1);
                }
            }
            DispatchEvent::Skipped { recipient } => {
                if let Some(pb) = &bar {
                    pb.set_message(format!("{recipient}: already sent"));
                    pb.inc(1);
                }
            }
            DispatchEvent::WindowClosed { .. } => {
                if let Some(pb) = bar.take() {
                    pb.finish();
                }
            }
            DispatchEvent::PoolDrained { remaining_windows } => {
                if remaining_windows > 0 {
                    println!("All recipients handled; skipping {remaining_windows} window(s).");
                }
            }
        }
    }
    if let Some(pb) = bar.take() {
        pb.finish();
    }
}

fn show_status(config: &HeraldConfig) -> anyhow::Result<()> {
    let ledger = DeliveryLedger::open(&config.ledger.database_path)?;
    let counts = ledger.counts()?;
    println!("Ledger: {}", ledger.path().display());
    println!("  sent:    {}", counts.sent);
    println!("  failed:  {}", counts.failed);
    println!("  pending: {}", counts.pending);
    println!("  total:   {}", counts.total());
    Ok(())
}

fn reset_failed(config: &HeraldConfig) -> anyhow::Result<()> {
    let ledger = DeliveryLedger::open(&config.ledger.database_path)?;
    let changed = ledger.reset_failed()?;
    println!("Re-armed {changed} failed recipient(s).");
    Ok(())
}

fn reset_all(config: &HeraldConfig) -> anyhow::Result<()> {
    let ledger = DeliveryLedger::open(&config.ledger.database_path)?;
    let removed = ledger.reset_all()?;
    println!("Cleared {removed} ledger record(s).");
    Ok(())
}
