//! The acquisition backend capability trait and its error type.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::config::MAX_AGGREGATE_SCAN_RATE;
use crate::hardware::raw::RawBatch;

/// Opaque handle to an opened device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u32);

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device#{}", self.0)
    }
}

/// Classification of backend failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Setup rejected; no data ever flows.
    Configuration,
    /// No data within the read timeout. Retried silently.
    Timeout,
    /// Read failure other than a timeout. Ends the session.
    Read,
    /// Byte or sample count inconsistent with the channel layout. Ends the session.
    MalformedBatch,
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Timeout => "timeout",
            Self::Read => "read",
            Self::MalformedBatch => "malformed batch",
        };
        f.write_str(name)
    }
}

/// Error reported by a backend call, carrying the native error code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error {code}: {message}")]
pub struct BackendError {
    /// Failure class
    pub kind: BackendErrorKind,
    /// Native error code (errno-style for kernel drivers)
    pub code: i32,
    /// Human readable description
    pub message: String,
}

impl BackendError {
    /// Setup failure.
    pub fn configuration(code: i32, message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Configuration,
            code,
            message: message.into(),
        }
    }

    /// Read timeout with no data.
    pub fn timeout() -> Self {
        Self {
            kind: BackendErrorKind::Timeout,
            code: 0,
            message: "Timed out waiting for data".to_string(),
        }
    }

    /// Fatal read failure.
    pub fn read(code: i32, message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Read,
            code,
            message: message.into(),
        }
    }

    /// Inconsistent batch layout.
    pub fn malformed_batch(message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::MalformedBatch,
            code: 0,
            message: message.into(),
        }
    }

    /// True for the silently retried case.
    pub fn is_timeout(&self) -> bool {
        self.kind == BackendErrorKind::Timeout
    }
}

/// Channel layout and timing requested from a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    /// Number of channels scanned, starting at channel 0
    pub num_channels: usize,
    /// Requested interval between raw scans, seconds
    pub scan_interval: f64,
    /// Lower input bound per channel, volts
    pub min_voltage: Vec<f64>,
    /// Upper input bound per channel, volts
    pub max_voltage: Vec<f64>,
}

impl ChannelConfig {
    /// Human readable rendering of the setup command, used in error reports.
    pub fn describe(&self) -> String {
        let ranges = (0..self.num_channels)
            .map(|ch| {
                format!(
                    "ch{ch}[{}, {}] V",
                    self.min_voltage.get(ch).copied().unwrap_or_default(),
                    self.max_voltage.get(ch).copied().unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "scan {} channel(s) every {:.0} ns: {ranges}",
            self.num_channels,
            self.scan_interval * 1e9
        )
    }
}

/// Capability interface over acquisition hardware.
///
/// All calls for one session happen on the acquisition worker thread, in the order
/// `open`, `configure`, `start`, repeated `read_batch`, then `stop` and `close`.
/// `cancel` may be issued before `stop` to abort an in-flight command.
pub trait AcquisitionBackend: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Fastest raw scan rate (scans per second) for the given channel count.
    fn max_scan_rate(&self, num_channels: usize) -> f64 {
        f64::from(MAX_AGGREGATE_SCAN_RATE) / num_channels.max(1) as f64
    }

    /// Open the device.
    fn open(&mut self) -> Result<DeviceHandle, BackendError>;

    /// Configure the channel layout. Returns the raw scan interval actually achieved,
    /// which the caller must use from then on.
    fn configure(
        &mut self,
        handle: DeviceHandle,
        config: &ChannelConfig,
    ) -> Result<f64, BackendError>;

    /// Begin acquisition.
    fn start(&mut self, handle: DeviceHandle) -> Result<(), BackendError>;

    /// Read up to `max_scans` scans, waiting at most `timeout`.
    ///
    /// Returns `BackendErrorKind::Timeout` (or an empty batch) when nothing arrived.
    fn read_batch(
        &mut self,
        handle: DeviceHandle,
        max_scans: usize,
        timeout: Duration,
    ) -> Result<RawBatch, BackendError>;

    /// Abort any in-flight command.
    fn cancel(&mut self, handle: DeviceHandle);

    /// Stop acquisition.
    fn stop(&mut self, handle: DeviceHandle);

    /// Release the device.
    fn close(&mut self, handle: DeviceHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert!(BackendError::timeout().is_timeout());
        assert!(!BackendError::read(5, "Input/output error").is_timeout());
        assert_eq!(
            BackendError::configuration(22, "Invalid argument").to_string(),
            "configuration error 22: Invalid argument"
        );
    }

    #[test]
    fn test_describe_command() {
        let config = ChannelConfig {
            num_channels: 2,
            scan_interval: 0.001,
            min_voltage: vec![-10.0, 0.0],
            max_voltage: vec![10.0, 5.0],
        };
        let text = config.describe();
        assert!(text.contains("2 channel(s)"));
        assert!(text.contains("1000000 ns"));
        assert!(text.contains("ch1[0, 5] V"));
    }
}
