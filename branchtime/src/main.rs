use anyhow::{Context, Result};
use branchtime::clock::MonotonicClock;
use branchtime::host::{self, HostResponse};
use branchtime::resolver::GitResolver;
use branchtime::settings::{Settings, SettingsManager};
use branchtime::store::{JsonFileStore, Store};
use branchtime::tracker::{TrackerError, TrackerHandle, TrackerService};
use branchtime_core::{repositories, repository_totals, stats_for_repository};
use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Track time spent per Git repository and branch")]
struct Cli {
    #[arg(long, global = true, help = "Settings file to use", value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Track activity from editor events read as JSON lines on stdin
    Watch {
        #[arg(long = "root", help = "Workspace root (repeatable, defaults to the current directory)", value_name = "PATH")]
        roots: Vec<PathBuf>,
    },
    /// Show recorded time per repository, branch and day
    Report {
        #[arg(long, help = "Only show this repository", value_name = "NAME")]
        repo: Option<String>,
    },
    /// Clear all recorded time
    Reset,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn init_logging() {
    let debug_enabled = env::var("BRANCHTIME_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let manager = match cli.config {
        Some(path) => SettingsManager::with_path(path),
        None => SettingsManager::new()?,
    };
    manager
        .load()
        .await
        .with_context(|| format!("Failed to load {}", manager.config_path().display()))?;
    let settings = manager.get().await;

    let store = JsonFileStore::in_dir(&settings.data_dir()?);

    match cli.command {
        Command::Watch { roots } => watch(&settings, store, roots).await,
        Command::Report { repo } => report(&store, repo.as_deref()).await,
        Command::Reset => {
            store.save(&[]).await.context("Failed to clear time data")?;
            println!("✓ Time data cleared");
            Ok(())
        }
    }
}

async fn watch(settings: &Settings, store: JsonFileStore, roots: Vec<PathBuf>) -> Result<()> {
    let roots = if roots.is_empty() {
        vec![env::current_dir().context("Could not determine current directory")?]
    } else {
        roots
    };

    info!("Recording time data in {}", store.describe());
    let tracker = TrackerService::start(
        settings.tracker_config(),
        roots,
        Arc::new(GitResolver::new(settings.tracking.detached_branch.clone())),
        Arc::new(store),
        Arc::new(MonotonicClock::new()),
    )
    .await;

    let outcome = pump_stdin(&tracker).await;

    // Runs on every exit path so the active session and pending batch are
    // written before the process ends.
    let disposed = match tracker.dispose().await {
        Err(TrackerError::Disposed) => Ok(()),
        other => other,
    };

    outcome?;
    disposed.context("Failed to save time data on shutdown")?;
    Ok(())
}

async fn pump_stdin(tracker: &TrackerHandle) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("Failed to read stdin")? {
                Some(line) => handle_line(tracker, &line).await?,
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
        }
    }
}

async fn handle_line(tracker: &TrackerHandle, line: &str) -> Result<()> {
    let event = match host::parse_event(line) {
        Ok(Some(event)) => event,
        Ok(None) => return Ok(()),
        Err(e) => {
            warn!("{:#}", e);
            return Ok(());
        }
    };

    if let Some(response) = host::respond(tracker, event).await? {
        print_response(&response)?;
    }
    Ok(())
}

fn print_response(response: &HostResponse) -> Result<()> {
    println!("{}", response.to_line()?);
    Ok(())
}

async fn report(store: &JsonFileStore, only: Option<&str>) -> Result<()> {
    let entries = store
        .load()
        .await
        .with_context(|| format!("Failed to read {}", store.describe()))?;

    if entries.is_empty() {
        println!("No time recorded yet");
        return Ok(());
    }

    let totals = repository_totals(&entries);
    for repository in repositories(&entries) {
        if only.is_some_and(|name| name != repository) {
            continue;
        }

        let total = totals.get(&repository).copied().unwrap_or(0);
        println!("{}  {}", repository, format_duration(total));

        for (branch, days) in stats_for_repository(&entries, &repository) {
            let branch_total: u64 = days.values().sum();
            println!("  {}  {}", branch, format_duration(branch_total));
            for (date, seconds) in days {
                println!("    {}  {}", date, format_duration(seconds));
            }
        }
    }

    Ok(())
}

fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m {}s", minutes, seconds % 60)
    }
}
