//! Logging setup.
//!
//! Library code only emits `tracing` events; binaries call [`init`] or
//! [`init_from_config`] once to install a `tracing-subscriber` formatter.
//! The `[application]` section selects level, format, colors and span events;
//! `RUST_LOG` overrides the configured level.
//!
//! # Example
//! ```no_run
//! use daq_recorder::{config::RecorderConfig, logging};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RecorderConfig::load()?;
//! logging::init_from_config(&config)?;
//! tracing::info!(channels = config.acquisition.num_channels, "Recorder ready");
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer,
};

use crate::config::RecorderConfig;
use crate::error::{AppResult, DaqError};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Multi-line (interactive use)
    Pretty,
    /// One line per event
    Compact,
    /// Newline-delimited JSON
    Json,
}

impl FromStr for OutputFormat {
    type Err = DaqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(DaqError::Configuration(format!(
                "Unknown log format '{other}'. Must be one of: pretty, compact, json"
            ))),
        }
    }
}

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: Level,
    /// Output format
    pub format: OutputFormat,
    /// Log span open/close
    pub with_span_events: bool,
    /// Include file and line numbers
    pub with_file_and_line: bool,
    /// Include thread names (the acquisition worker is named `acquisition`)
    pub with_thread_names: bool,
    /// Colored output (ignored for JSON)
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: OutputFormat::Compact,
            with_span_events: false,
            with_file_and_line: false,
            with_thread_names: true,
            with_ansi: false,
        }
    }
}

impl TracingConfig {
    /// Config with the given default level
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Config derived from the recorder configuration
    pub fn from_recorder_config(config: &RecorderConfig) -> AppResult<Self> {
        let app = &config.application;
        Ok(Self::new(parse_log_level(&app.log_level)?)
            .with_format(app.log_format.parse()?)
            .with_ansi(app.log_ansi)
            .with_span_events(app.log_span_events))
    }

    /// Set output format
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable span events
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }

    /// Enable or disable ANSI colors
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Install the global subscriber described by the recorder configuration.
pub fn init_from_config(config: &RecorderConfig) -> AppResult<()> {
    init(TracingConfig::from_recorder_config(config)?)
}

/// Install the global subscriber.
///
/// Idempotent: if a global subscriber is already installed this returns `Ok(())`,
/// so tests and embedding applications may call it freely.
pub fn init(config: TracingConfig) -> AppResult<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let result = match config.format {
        OutputFormat::Pretty => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .pretty()
                    .with_span_events(span_events)
                    .with_file(config.with_file_and_line)
                    .with_line_number(config.with_file_and_line)
                    .with_thread_names(config.with_thread_names)
                    .with_ansi(config.with_ansi)
                    .with_filter(env_filter),
            )
            .try_init(),
        OutputFormat::Compact => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .compact()
                    .with_span_events(span_events)
                    .with_file(config.with_file_and_line)
                    .with_line_number(config.with_file_and_line)
                    .with_thread_names(config.with_thread_names)
                    .with_ansi(config.with_ansi)
                    .with_filter(env_filter),
            )
            .try_init(),
        OutputFormat::Json => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(span_events)
                    .with_file(config.with_file_and_line)
                    .with_line_number(config.with_file_and_line)
                    .with_thread_names(config.with_thread_names)
                    .with_filter(env_filter),
            )
            .try_init(),
    };
    result.map_err(|e: TryInitError| {
        DaqError::Configuration(format!("Failed to initialize tracing: {e}"))
    })
}

/// Parse a level name (case insensitive).
pub fn parse_log_level(level: &str) -> AppResult<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(DaqError::Configuration(format!(
            "Invalid log level '{level}'. Must be one of: trace, debug, info, warn, error"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("warn").unwrap(), Level::WARN);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("Pretty".parse::<OutputFormat>().unwrap(), OutputFormat::Pretty);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_from_recorder_config() {
        let mut config = RecorderConfig::default();
        config.application.log_level = "trace".to_string();
        config.application.log_format = "JSON".to_string();
        config.application.log_ansi = true;
        config.application.log_span_events = true;
        let tracing_config = TracingConfig::from_recorder_config(&config).unwrap();
        assert_eq!(tracing_config.level, Level::TRACE);
        assert_eq!(tracing_config.format, OutputFormat::Json);
        assert!(tracing_config.with_ansi);
        assert!(tracing_config.with_span_events);
    }

    #[test]
    fn test_default_config_is_plain_compact() {
        let tracing_config = TracingConfig::from_recorder_config(&RecorderConfig::default()).unwrap();
        assert_eq!(tracing_config.format, OutputFormat::Compact);
        assert!(!tracing_config.with_ansi);
        assert!(!tracing_config.with_span_events);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let mut config = RecorderConfig::default();
        config.application.log_format = "xml".to_string();
        assert!(TracingConfig::from_recorder_config(&config).is_err());
    }

    #[test]
    fn test_init_is_idempotent() {
        assert!(init(TracingConfig::default()).is_ok());
        assert!(tracing::dispatcher::has_been_set());
        assert!(init(TracingConfig::default().with_format(OutputFormat::Json)).is_ok());
    }
}
