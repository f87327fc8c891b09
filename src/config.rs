//! Recorder configuration using Figment.
//!
//! Configuration is layered:
//! 1. Built-in defaults (the classic recorder defaults: 2 channels at 100 Hz, ±10 V)
//! 2. `config/recorder.toml` (or an explicit path), if present
//! 3. Environment variables prefixed with `DAQ_RECORDER_`, nested keys split on `__`
//!
//! # Example
//! ```no_run
//! use daq_recorder::config::RecorderConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // DAQ_RECORDER_ACQUISITION__SAMPLING_RATE=500 overrides the file value
//! let config = RecorderConfig::load()?;
//! config.validate()?;
//! println!("{} channels at {} Hz", config.acquisition.num_channels, config.acquisition.sampling_rate);
//! # Ok(())
//! # }
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppResult, DaqError};
use crate::validation;

/// Upper bound on simultaneously acquired channels.
pub const MAX_CHANNELS: usize = 8;

/// Aggregate conversions per second shared by all active channels.
pub const MAX_AGGREGATE_SCAN_RATE: u32 = 250_000;

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/recorder.toml";

/// An RGB color as stored in configuration files.
pub type Rgb = [u8; 3];

/// Top-level recorder configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Acquisition parameters consumed by the controller
    pub acquisition: AcquisitionSettings,
    /// Colors and redraw pacing
    pub display: DisplaySettings,
    /// Which acquisition backend to use
    pub backend: BackendConfig,
    /// Live recording position publication
    pub timestamp: TimestampConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log line format (pretty, compact, json)
    pub log_format: String,
    /// Colored log output
    pub log_ansi: bool,
    /// Log span open/close events
    pub log_span_events: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "DAQ Recorder".to_string(),
            log_level: "info".to_string(),
            log_format: "compact".to_string(),
            log_ansi: false,
            log_span_events: false,
        }
    }
}

/// Acquisition parameters.
///
/// `min_voltage` / `max_voltage` hold one entry per possible channel; only the first
/// `num_channels` entries are used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    /// Number of active channels (1..=8)
    pub num_channels: usize,
    /// Target per-channel sampling rate in Hz
    pub sampling_rate: u32,
    /// Lower input bound per channel, volts
    pub min_voltage: Vec<f64>,
    /// Upper input bound per channel, volts
    pub max_voltage: Vec<f64>,
    /// Backend read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Amount of data requested per backend read, in milliseconds of acquisition
    pub update_interval_ms: u64,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            num_channels: 2,
            sampling_rate: 100,
            min_voltage: vec![-10.0; MAX_CHANNELS],
            max_voltage: vec![10.0; MAX_CHANNELS],
            read_timeout_ms: 100,
            update_interval_ms: 10,
        }
    }
}

impl AcquisitionSettings {
    /// Effective sample interval requested by the operator, seconds.
    pub fn dt(&self) -> f64 {
        1.0 / f64::from(self.sampling_rate.max(1))
    }

    /// Voltage bounds of one channel.
    pub fn voltage_range(&self, channel: usize) -> (f64, f64) {
        let min = self.min_voltage.get(channel).copied().unwrap_or(-10.0);
        let max = self.max_voltage.get(channel).copied().unwrap_or(10.0);
        (min, max)
    }

    /// Union of the active channels' voltage bounds, used as the fit-all vertical range.
    pub fn display_range(&self) -> (f64, f64) {
        (0..self.num_channels.max(1))
            .map(|ch| self.voltage_range(ch))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (min, max)| {
                (lo.min(min), hi.max(max))
            })
    }

    /// Backend read timeout.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Interval of acquisition covered by one backend read.
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Validate the acquisition parameters.
    pub fn validate(&self) -> AppResult<()> {
        validation::is_valid_channel_count(self.num_channels)
            .map_err(|e| DaqError::Configuration(e.to_string()))?;
        validation::is_valid_sampling_rate(self.sampling_rate, self.num_channels)
            .map_err(DaqError::Configuration)?;

        if self.min_voltage.len() < self.num_channels || self.max_voltage.len() < self.num_channels
        {
            return Err(DaqError::Configuration(format!(
                "Voltage ranges must be given for all {} channels",
                self.num_channels
            )));
        }
        for channel in 0..self.num_channels {
            let (min, max) = self.voltage_range(channel);
            validation::is_valid_voltage_range(min, max).map_err(|e| {
                DaqError::Configuration(format!("Channel {channel}: {e}"))
            })?;
        }

        if self.read_timeout_ms == 0 || self.update_interval_ms == 0 {
            return Err(DaqError::Configuration(
                "Read timeout and update interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Display colors and redraw pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Axis, label and rubber band color
    pub foreground: Rgb,
    /// Plot background
    pub background: Rgb,
    /// Trace color per channel
    pub colors: Vec<Rgb>,
    /// Vertical separation between stacked traces, volts
    pub trace_offset_step: f64,
    /// Minimum interval between redraws triggered by new data, milliseconds
    pub render_interval_ms: u64,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            foreground: [255, 255, 255],
            background: [0, 0, 0],
            colors: vec![
                [255, 255, 0],   // yellow
                [0, 255, 0],     // green
                [255, 255, 255], // white
                [255, 0, 0],     // red
                [0, 0, 255],     // blue
                [0, 255, 255],   // cyan
                [255, 0, 255],   // magenta
                [0, 128, 0],     // dark green
            ],
            trace_offset_step: 0.1,
            render_interval_ms: 100,
        }
    }
}

impl DisplaySettings {
    /// Trace color for a channel; wraps around the configured palette.
    pub fn color(&self, channel: usize) -> Rgb {
        if self.colors.is_empty() {
            return self.foreground;
        }
        self.colors[channel % self.colors.len()]
    }

    /// Minimum interval between accepted data redraws.
    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }
}

/// Available acquisition backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Simulated hardware
    #[default]
    Mock,
}

/// Waveform produced by the simulated backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveformKind {
    /// Sine with a per-channel phase shift
    #[default]
    Sine,
    /// Linear ramp restarting every period
    Ramp,
    /// Constant level equal to the amplitude
    Constant,
}

/// Backend selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend implementation
    pub kind: BackendKind,
    /// Simulated backend parameters
    pub mock: MockSettings,
}

/// Parameters of the simulated backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockSettings {
    /// Raw scan rate ceiling; defaults to the aggregate bound split across channels
    pub max_scan_rate: Option<f64>,
    /// Waveform shape
    pub waveform: WaveformKind,
    /// Waveform frequency, Hz
    pub frequency_hz: f64,
    /// Peak amplitude, volts
    pub amplitude: f64,
    /// Uniform noise amplitude, volts
    pub noise: f64,
    /// Pace reads to wall-clock time like real hardware
    pub realtime: bool,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            max_scan_rate: None,
            waveform: WaveformKind::Sine,
            frequency_hz: 1.0,
            amplitude: 5.0,
            noise: 0.0,
            realtime: true,
        }
    }
}

/// Publication of the live recording position to a memory-mapped file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampConfig {
    /// Whether to publish at all
    pub enabled: bool,
    /// File path; defaults to `$HOME/.daq_recorder_timestamp`
    pub path: Option<PathBuf>,
}

impl TimestampConfig {
    /// Resolve the publication path, falling back to the home directory.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".daq_recorder_timestamp")))
    }
}

impl RecorderConfig {
    /// Load configuration from `config/recorder.toml` and environment variables
    ///
    /// Environment variables can override configuration with prefix `DAQ_RECORDER_`.
    /// Example: `DAQ_RECORDER_APPLICATION__LOG_LEVEL=debug`
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; the built-in defaults are used instead.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("DAQ_RECORDER_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Write the configuration back as TOML, creating parent directories as needed.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        tracing::debug!(path = %path.display(), "Saved recorder configuration");
        Ok(())
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        validation::is_valid_log_level(&self.application.log_level)
            .map_err(|e| DaqError::Configuration(e.to_string()))?;
        validation::is_valid_log_format(&self.application.log_format)
            .map_err(|e| DaqError::Configuration(e.to_string()))?;
        self.acquisition.validate()?;

        if !self.display.trace_offset_step.is_finite() || self.display.trace_offset_step < 0.0 {
            return Err(DaqError::Configuration(
                "Trace offset step must be a non-negative number".to_string(),
            ));
        }

        if self.timestamp.enabled {
            let path = self.timestamp.resolved_path().ok_or_else(|| {
                DaqError::Configuration("No timestamp path and no home directory".to_string())
            })?;
            validation::is_valid_path(&path.to_string_lossy())
                .map_err(|e| DaqError::Configuration(e.to_string()))?;
        }
        Ok(())
    }
}
