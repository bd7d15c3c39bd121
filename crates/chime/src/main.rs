//! Chime: personal reminder scheduler.
//!
//! Subcommands:
//! - `preview`: expand and print the upcoming queue without registering
//! - `arm`: run the full pipeline against the file-backed notifier
//! - `stop`: cancel one schedule's registrations
//! - `pending`: list currently registered notifications

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chime::FileNotifier;
use chime_core::{ScheduleId, Settings};
use chime_dispatch::{BatchOutcome, DispatchAdapter};
use chime_engine::{apply_quiet_hours, build_queue};

#[derive(Parser)]
#[command(name = "chime")]
#[command(about = "Personal reminder scheduler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand every active schedule and print the upcoming queue
    Preview {
        /// Settings blob path
        #[arg(long, env = "CHIME_SETTINGS")]
        settings: Option<PathBuf>,

        /// Override "now" for deterministic output (YYYY-MM-DDTHH:MM)
        #[arg(long)]
        now: Option<String>,

        /// Maximum instants to print
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Register the filtered queue with the file-backed notifier
    Arm {
        /// Settings blob path
        #[arg(long, env = "CHIME_SETTINGS")]
        settings: Option<PathBuf>,

        /// Pending-registrations state file
        #[arg(long, env = "CHIME_STATE")]
        state: Option<PathBuf>,

        /// Override "now" (YYYY-MM-DDTHH:MM)
        #[arg(long)]
        now: Option<String>,
    },

    /// Cancel every registration belonging to one schedule
    Stop {
        /// The schedule id to cancel
        schedule_id: String,

        /// Pending-registrations state file
        #[arg(long, env = "CHIME_STATE")]
        state: Option<PathBuf>,
    },

    /// List pending registrations
    Pending {
        /// Pending-registrations state file
        #[arg(long, env = "CHIME_STATE")]
        state: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "chime=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Preview { settings, now, limit } => run_preview(settings, now, limit),

        Commands::Arm { settings, state, now } => run_arm(settings, state, now).await,

        Commands::Stop { schedule_id, state } => run_stop(&schedule_id, state).await,

        Commands::Pending { state } => run_pending(state).await,
    }
}

fn run_preview(settings: Option<PathBuf>, now: Option<String>, limit: usize) -> Result<()> {
    let settings = Settings::load(&settings_path(settings));
    let now = resolve_now(now.as_deref())?;

    let queue = build_queue(now, &settings.schedules, limit);
    let queue = apply_quiet_hours(queue, &settings.quiet_hours);

    if queue.is_empty() {
        println!("nothing to schedule");
        return Ok(());
    }
    for instant in queue {
        println!(
            "{}  {}  {}",
            instant.fire_at.format("%Y-%m-%d %H:%M"),
            instant.schedule_id,
            instant.message
        );
    }
    Ok(())
}

async fn run_arm(
    settings: Option<PathBuf>,
    state: Option<PathBuf>,
    now: Option<String>,
) -> Result<()> {
    let settings = Settings::load(&settings_path(settings));
    let now = resolve_now(now.as_deref())?;

    let notifier = FileNotifier::open(state_path(state))
        .await
        .map_err(|e| miette!("{}", e))?;
    let adapter = DispatchAdapter::new(Arc::new(notifier));

    match adapter.register_batch(&settings, now).await {
        Ok(BatchOutcome::Armed { registered }) => {
            println!("registered {} notifications", registered);
            Ok(())
        }
        Ok(BatchOutcome::NothingToSchedule) => {
            println!("nothing to schedule (check windows, day masks, and quiet hours)");
            Ok(())
        }
        Err(e) => Err(miette!("{}", e)),
    }
}

async fn run_stop(schedule_id: &str, state: Option<PathBuf>) -> Result<()> {
    let id: ScheduleId = schedule_id
        .parse()
        .map_err(|_| miette!("invalid schedule id: {}", schedule_id))?;

    let notifier = FileNotifier::open(state_path(state))
        .await
        .map_err(|e| miette!("{}", e))?;
    let adapter = DispatchAdapter::new(Arc::new(notifier));

    let cancelled = adapter
        .cancel_for_schedule(&id)
        .await
        .map_err(|e| miette!("{}", e))?;
    println!("cancelled {} registrations", cancelled);
    Ok(())
}

async fn run_pending(state: Option<PathBuf>) -> Result<()> {
    use chime_dispatch::Notifier;

    let notifier = FileNotifier::open(state_path(state))
        .await
        .map_err(|e| miette!("{}", e))?;

    let mut pending = notifier.list_pending().await.map_err(|e| miette!("{}", e))?;
    pending.sort_by_key(|p| p.fire_at);

    if pending.is_empty() {
        println!("no pending registrations");
        return Ok(());
    }
    for entry in pending {
        println!(
            "{}  {}  {}",
            entry.fire_at.format("%Y-%m-%d %H:%M"),
            entry.tag,
            entry.id
        );
    }
    Ok(())
}

fn settings_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chime")
            .join("settings.json")
    })
}

fn state_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chime")
            .join("pending.json")
    })
}

fn resolve_now(explicit: Option<&str>) -> Result<NaiveDateTime> {
    match explicit {
        Some(raw) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
            .into_diagnostic(),
        None => Ok(chrono::Local::now().naive_local()),
    }
}
