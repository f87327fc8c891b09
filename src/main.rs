//! CLI entry point for daq-recorder
//!
//! ```bash
//! daq-recorder record --duration 10 --output run.csv
//! daq-recorder info run.csv
//! daq-recorder position
//! daq-recorder gui            # requires the `gui` feature
//! ```

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use daq_recorder::config::RecorderConfig;
use daq_recorder::data::load_series;
use daq_recorder::logging;
use daq_recorder::session::{RecorderSession, SessionNotice};
use daq_recorder::timestamp::read_timestamp;
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "daq-recorder")]
#[command(about = "Continuous multi-channel analog recorder", long_about = None)]
struct Cli {
    /// Configuration file (defaults to config/recorder.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record for a fixed time without a window and save the result as CSV
    Record {
        /// Recording length in seconds
        #[arg(long)]
        duration: f64,

        /// Output CSV file (defaults to the recording start time)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Summarize a saved series
    Info {
        /// CSV file written by `record` or the viewer
        file: PathBuf,
    },

    /// Print the time currently being recorded
    Position,

    /// Open the interactive viewer
    #[cfg(feature = "gui")]
    Gui,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RecorderConfig::load_from(path),
        None => RecorderConfig::load(),
    }
    .context("Failed to load configuration")?;
    logging::init_from_config(&config)?;

    match cli.command {
        Commands::Record { duration, output } => record(config, duration, output),
        Commands::Info { file } => print_info(&file),
        Commands::Position => print_position(&config),
        #[cfg(feature = "gui")]
        Commands::Gui => daq_recorder::gui::run(config),
    }
}

fn record(config: RecorderConfig, duration: f64, output: Option<PathBuf>) -> Result<()> {
    if !duration.is_finite() || duration <= 0.0 {
        bail!("Duration must be a positive number of seconds, got {duration}");
    }

    let mut session = RecorderSession::from_config(config)?;
    session.start_recording()?;
    info!(duration, "Recording");

    let deadline = Instant::now() + Duration::from_secs_f64(duration);
    let mut errors = Vec::new();
    while session.is_recording() && Instant::now() < deadline {
        collect_errors(session.poll_events(), &mut errors);
        thread::sleep(POLL_INTERVAL);
    }
    if session.is_recording() {
        if let Err(e) = session.stop_recording() {
            debug!(error = %e, "Acquisition already stopping");
        }
    }
    collect_errors(session.wait_until_idle(STOP_TIMEOUT)?, &mut errors);

    let output = output.unwrap_or_else(|| PathBuf::from(session.suggested_filename()));
    let rows = session
        .save(&output)
        .with_context(|| format!("Failed to save {}", output.display()))?;
    println!("Saved {rows} rows to {}", output.display());

    if let Some(first) = errors.first() {
        bail!("Acquisition failed:\n{first}");
    }
    Ok(())
}

fn collect_errors(notices: Vec<SessionNotice>, errors: &mut Vec<String>) {
    for notice in notices {
        if let SessionNotice::Error(message) = notice {
            eprintln!("{message}");
            errors.push(message);
        }
    }
}

fn print_info(file: &Path) -> Result<()> {
    let store =
        load_series(file).with_context(|| format!("Failed to read {}", file.display()))?;
    println!("{}: {} channel(s)", file.display(), store.num_channels());
    for (channel, series) in store.channels() {
        let (Some(first), Some(last)) = (series.points().first(), series.points().last()) else {
            println!("  {channel}: empty");
            continue;
        };
        let (min, max) = series.value_range().unwrap_or((0.0, 0.0));
        println!(
            "  {channel}: {} points, {:.6} s .. {:.6} s, min {min:.6} V, max {max:.6} V",
            series.len(),
            first.time,
            last.time,
        );
    }
    Ok(())
}

fn print_position(config: &RecorderConfig) -> Result<()> {
    let Some(path) = config.timestamp.resolved_path() else {
        bail!("No timestamp file location (set timestamp.path)");
    };
    match read_timestamp(&path) {
        Some(time) => println!("{time:.6}"),
        None => println!("not recording"),
    }
    Ok(())
}
