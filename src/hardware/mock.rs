//! Simulated acquisition hardware.
//!
//! `MockBackend` stands in for a converter board in tests and demos. It produces a
//! deterministic waveform per channel, optionally with uniform noise, and can pace its
//! reads to wall-clock time the way a real device fills its buffer.
//!
//! Failures are injectable at every lifecycle step, and every backend call is
//! recorded in a shared [`CallLog`] so tests can assert on the exact call order even
//! after the backend has moved onto the acquisition thread.
//!
//! ```
//! use daq_recorder::hardware::{AcquisitionBackend, FailurePoint, MockBackend};
//!
//! let backend = MockBackend::builder()
//!     .max_scan_rate(1_000.0)
//!     .realtime(false)
//!     .fail_at(FailurePoint::ReadAfter(500))
//!     .build();
//! assert_eq!(backend.name(), "mock");
//! ```

use std::f64::consts::TAU;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::config::{BackendConfig, BackendKind, MockSettings, WaveformKind};
use crate::hardware::backend::{AcquisitionBackend, BackendError, ChannelConfig, DeviceHandle};
use crate::hardware::raw::{RawBatch, SampleRange};

/// errno values reported by injected failures.
const EIO: i32 = 5;
const EINVAL: i32 = 22;
const EBUSY: i32 = 16;

/// Poll granularity used when the mock is not paced to real time.
const IDLE_WAIT: Duration = Duration::from_millis(1);

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    /// `open`
    Open,
    /// `configure` with the requested raw scan interval
    Configure {
        /// Channels requested
        num_channels: usize,
        /// Raw scan interval requested, seconds
        scan_interval: f64,
    },
    /// `start`
    Start,
    /// `read_batch`
    ReadBatch {
        /// Scan cap requested by the caller
        max_scans: usize,
    },
    /// `cancel`
    Cancel,
    /// `stop`
    Stop,
    /// `close`
    Close,
}

/// Shared record of backend calls.
pub type CallLog = Arc<Mutex<Vec<BackendCall>>>;

/// Where an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    /// `open` fails
    Open,
    /// `configure` rejects the setup
    Configure,
    /// `start` fails
    Start,
    /// A fatal read error once this many scans have been delivered
    ReadAfter(u64),
    /// An odd byte count once this many scans have been delivered
    MalformedAfter(u64),
}

/// Builder for [`MockBackend`].
#[derive(Debug, Clone)]
pub struct MockBackendBuilder {
    max_scan_rate: Option<f64>,
    scans_per_read: Option<usize>,
    waveform: WaveformKind,
    frequency_hz: f64,
    amplitude: f64,
    noise: f64,
    realtime: bool,
    scan_budget: Option<u64>,
    failure: Option<FailurePoint>,
    seed: u64,
}

impl Default for MockBackendBuilder {
    fn default() -> Self {
        let settings = MockSettings::default();
        Self {
            max_scan_rate: settings.max_scan_rate,
            scans_per_read: None,
            waveform: settings.waveform,
            frequency_hz: settings.frequency_hz,
            amplitude: settings.amplitude,
            noise: settings.noise,
            realtime: settings.realtime,
            scan_budget: None,
            failure: None,
            seed: 0x5eed,
        }
    }
}

impl MockBackendBuilder {
    /// Raw scan rate ceiling, scans per second.
    pub fn max_scan_rate(mut self, rate: f64) -> Self {
        self.max_scan_rate = Some(rate);
        self
    }

    /// Cap on scans delivered per read.
    pub fn scans_per_read(mut self, scans: usize) -> Self {
        self.scans_per_read = Some(scans.max(1));
        self
    }

    /// Waveform shape.
    pub fn waveform(mut self, waveform: WaveformKind) -> Self {
        self.waveform = waveform;
        self
    }

    /// Waveform frequency, Hz.
    pub fn frequency(mut self, hz: f64) -> Self {
        self.frequency_hz = hz;
        self
    }

    /// Peak amplitude, volts.
    pub fn amplitude(mut self, volts: f64) -> Self {
        self.amplitude = volts;
        self
    }

    /// Uniform noise amplitude, volts.
    pub fn noise(mut self, volts: f64) -> Self {
        self.noise = volts.abs();
        self
    }

    /// Pace reads to wall-clock time.
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Stop producing data after this many scans; later reads time out.
    pub fn scan_budget(mut self, scans: u64) -> Self {
        self.scan_budget = Some(scans);
        self
    }

    /// Inject a failure.
    pub fn fail_at(mut self, failure: FailurePoint) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Seed for the noise generator.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Finish building.
    pub fn build(self) -> MockBackend {
        MockBackend {
            rng: StdRng::seed_from_u64(self.seed),
            params: self,
            calls: Arc::new(Mutex::new(Vec::new())),
            next_handle: 1,
            handle: None,
            config: None,
            scan_interval: 0.0,
            scans_emitted: 0,
            started_at: None,
        }
    }
}

/// Simulated converter board.
pub struct MockBackend {
    params: MockBackendBuilder,
    rng: StdRng,
    calls: CallLog,
    next_handle: u32,
    handle: Option<DeviceHandle>,
    config: Option<ChannelConfig>,
    scan_interval: f64,
    scans_emitted: u64,
    started_at: Option<Instant>,
}

impl MockBackend {
    /// Start building a mock backend.
    pub fn builder() -> MockBackendBuilder {
        MockBackendBuilder::default()
    }

    /// Build from configuration file settings.
    pub fn from_settings(settings: &MockSettings) -> Self {
        let mut builder = Self::builder()
            .waveform(settings.waveform)
            .frequency(settings.frequency_hz)
            .amplitude(settings.amplitude)
            .noise(settings.noise)
            .realtime(settings.realtime);
        if let Some(rate) = settings.max_scan_rate {
            builder = builder.max_scan_rate(rate);
        }
        builder.build()
    }

    /// Shared handle to the call record.
    pub fn call_log(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    /// Scans delivered since the last `start`.
    pub fn scans_emitted(&self) -> u64 {
        self.scans_emitted
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().push(call);
    }

    fn check_handle(&self, handle: DeviceHandle) -> Result<(), BackendError> {
        if self.handle == Some(handle) {
            Ok(())
        } else {
            Err(BackendError::read(EINVAL, format!("Unknown handle {handle}")))
        }
    }

    fn sample(&mut self, channel: usize, scan: u64) -> f64 {
        let num_channels = self.config.as_ref().map_or(1, |c| c.num_channels.max(1));
        let t = scan as f64 * self.scan_interval;
        let phase = channel as f64 / num_channels as f64;
        let amplitude = self.params.amplitude;

        let clean = match self.params.waveform {
            WaveformKind::Sine => amplitude * (TAU * (self.params.frequency_hz * t + phase)).sin(),
            WaveformKind::Ramp => {
                let cycle = (self.params.frequency_hz * t + phase).fract();
                amplitude * (2.0 * cycle - 1.0)
            }
            WaveformKind::Constant => amplitude,
        };
        let noisy = if self.params.noise > 0.0 {
            clean + self.rng.gen_range(-self.params.noise..=self.params.noise)
        } else {
            clean
        };

        // The converter saturates at its configured input range.
        match &self.config {
            Some(config) => {
                let min = config.min_voltage.get(channel).copied().unwrap_or(f64::MIN);
                let max = config.max_voltage.get(channel).copied().unwrap_or(f64::MAX);
                noisy.clamp(min, max)
            }
            None => noisy,
        }
    }

    /// Scans that may be delivered by this read before any injected limit.
    fn limit_for_read(&self, max_scans: usize) -> u64 {
        let mut limit = max_scans.max(1) as u64;
        if let Some(cap) = self.params.scans_per_read {
            limit = limit.min(cap as u64);
        }
        if let Some(budget) = self.params.scan_budget {
            limit = limit.min(budget.saturating_sub(self.scans_emitted));
        }
        match self.params.failure {
            Some(FailurePoint::ReadAfter(n)) | Some(FailurePoint::MalformedAfter(n)) => {
                limit.min(n.saturating_sub(self.scans_emitted))
            }
            _ => limit,
        }
    }

    /// Wait for paced data; returns how many scans are ready (0 on timeout).
    fn wait_for_scans(&self, limit: u64, timeout: Duration) -> u64 {
        if limit == 0 {
            thread::sleep(if self.params.realtime { timeout } else { IDLE_WAIT.min(timeout) });
            return 0;
        }
        if !self.params.realtime || self.scan_interval <= 0.0 {
            return limit;
        }
        let Some(started) = self.started_at else {
            return 0;
        };

        let deadline = Instant::now() + timeout;
        loop {
            let due = (started.elapsed().as_secs_f64() / self.scan_interval).floor() as u64;
            let ready = due.saturating_sub(self.scans_emitted).min(limit);
            if ready > 0 {
                return ready;
            }
            let now = Instant::now();
            if now >= deadline {
                return 0;
            }
            let next_scan = started
                + Duration::from_secs_f64((self.scans_emitted + 1) as f64 * self.scan_interval);
            thread::sleep(next_scan.min(deadline).saturating_duration_since(now));
        }
    }
}

impl AcquisitionBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn max_scan_rate(&self, num_channels: usize) -> f64 {
        self.params.max_scan_rate.unwrap_or_else(|| {
            f64::from(crate::config::MAX_AGGREGATE_SCAN_RATE) / num_channels.max(1) as f64
        })
    }

    fn open(&mut self) -> Result<DeviceHandle, BackendError> {
        self.record(BackendCall::Open);
        if self.params.failure == Some(FailurePoint::Open) {
            return Err(BackendError::configuration(EBUSY, "Device or resource busy"));
        }
        let handle = DeviceHandle(self.next_handle);
        self.next_handle += 1;
        self.handle = Some(handle);
        debug!(%handle, "Mock device opened");
        Ok(handle)
    }

    fn configure(
        &mut self,
        handle: DeviceHandle,
        config: &ChannelConfig,
    ) -> Result<f64, BackendError> {
        self.record(BackendCall::Configure {
            num_channels: config.num_channels,
            scan_interval: config.scan_interval,
        });
        self.check_handle(handle)
            .map_err(|e| BackendError::configuration(e.code, e.message))?;
        if self.params.failure == Some(FailurePoint::Configure) {
            return Err(BackendError::configuration(EINVAL, "Invalid argument"));
        }
        if config.num_channels == 0 || !(config.scan_interval > 0.0) {
            return Err(BackendError::configuration(EINVAL, "Invalid argument"));
        }

        // Timers tick in whole nanoseconds and cannot beat the maximum scan rate.
        let fastest = 1.0 / self.max_scan_rate(config.num_channels);
        let achieved = (config.scan_interval.max(fastest) * 1e9).round() * 1e-9;

        self.config = Some(config.clone());
        self.scan_interval = achieved;
        debug!(
            requested = config.scan_interval,
            achieved, "Mock device configured"
        );
        Ok(achieved)
    }

    fn start(&mut self, handle: DeviceHandle) -> Result<(), BackendError> {
        self.record(BackendCall::Start);
        self.check_handle(handle)?;
        if self.params.failure == Some(FailurePoint::Start) {
            return Err(BackendError::configuration(EIO, "Input/output error"));
        }
        self.scans_emitted = 0;
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn read_batch(
        &mut self,
        handle: DeviceHandle,
        max_scans: usize,
        timeout: Duration,
    ) -> Result<RawBatch, BackendError> {
        self.record(BackendCall::ReadBatch { max_scans });
        self.check_handle(handle)?;
        let num_channels = self.config.as_ref().map_or(0, |c| c.num_channels);

        match self.params.failure {
            Some(FailurePoint::ReadAfter(n)) if self.scans_emitted >= n => {
                return Err(BackendError::read(EIO, "Input/output error"));
            }
            Some(FailurePoint::MalformedAfter(n)) if self.scans_emitted >= n => {
                let ranges = vec![SampleRange::new_16bit(-10.0, 10.0); num_channels];
                return RawBatch::from_sample_bytes(&[0u8; 3], &ranges);
            }
            _ => {}
        }

        let limit = self.limit_for_read(max_scans);
        let ready = self.wait_for_scans(limit, timeout);
        if ready == 0 {
            return Err(BackendError::timeout());
        }

        let mut samples = Vec::with_capacity(ready as usize * num_channels);
        for scan in self.scans_emitted..self.scans_emitted + ready {
            for channel in 0..num_channels {
                let value = self.sample(channel, scan);
                samples.push(value);
            }
        }
        self.scans_emitted += ready;
        trace!(scans = ready, total = self.scans_emitted, "Mock batch");
        RawBatch::new(samples, num_channels)
    }

    fn cancel(&mut self, _handle: DeviceHandle) {
        self.record(BackendCall::Cancel);
    }

    fn stop(&mut self, _handle: DeviceHandle) {
        self.record(BackendCall::Stop);
        self.started_at = None;
    }

    fn close(&mut self, handle: DeviceHandle) {
        self.record(BackendCall::Close);
        if self.handle == Some(handle) {
            self.handle = None;
            self.config = None;
        }
    }
}

/// Build the backend named by the configuration.
pub fn create_backend(config: &BackendConfig) -> Box<dyn AcquisitionBackend> {
    match config.kind {
        BackendKind::Mock => Box::new(MockBackend::from_settings(&config.mock)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::BackendErrorKind;

    fn two_channels(scan_interval: f64) -> ChannelConfig {
        ChannelConfig {
            num_channels: 2,
            scan_interval,
            min_voltage: vec![-10.0; 2],
            max_voltage: vec![10.0; 2],
        }
    }

    #[test]
    fn test_configure_coerces_interval() {
        let mut backend = MockBackend::builder().max_scan_rate(1_000.0).build();
        let handle = backend.open().unwrap();
        let achieved = backend.configure(handle, &two_channels(0.0001)).unwrap();
        assert!((achieved - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_unpaced_reads_honor_caps() {
        let mut backend = MockBackend::builder()
            .realtime(false)
            .scans_per_read(7)
            .scan_budget(10)
            .build();
        let handle = backend.open().unwrap();
        backend.configure(handle, &two_channels(0.001)).unwrap();
        backend.start(handle).unwrap();

        let first = backend.read_batch(handle, 100, Duration::from_millis(5)).unwrap();
        assert_eq!(first.num_scans(), 7);
        let second = backend.read_batch(handle, 100, Duration::from_millis(5)).unwrap();
        assert_eq!(second.num_scans(), 3);
        let third = backend.read_batch(handle, 100, Duration::from_millis(5)).unwrap_err();
        assert!(third.is_timeout());
    }

    #[test]
    fn test_constant_waveform_clamped_to_range() {
        let mut backend = MockBackend::builder()
            .realtime(false)
            .waveform(WaveformKind::Constant)
            .amplitude(12.0)
            .build();
        let handle = backend.open().unwrap();
        backend.configure(handle, &two_channels(0.001)).unwrap();
        backend.start(handle).unwrap();
        let batch = backend.read_batch(handle, 4, Duration::from_millis(5)).unwrap();
        assert!(batch.samples().iter().all(|&v| v == 10.0));
    }

    #[test]
    fn test_injected_failures() {
        let mut backend = MockBackend::builder()
            .realtime(false)
            .fail_at(FailurePoint::ReadAfter(5))
            .build();
        let handle = backend.open().unwrap();
        backend.configure(handle, &two_channels(0.001)).unwrap();
        backend.start(handle).unwrap();
        let batch = backend.read_batch(handle, 100, Duration::from_millis(5)).unwrap();
        assert_eq!(batch.num_scans(), 5);
        let err = backend.read_batch(handle, 100, Duration::from_millis(5)).unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Read);

        let mut backend = MockBackend::builder()
            .realtime(false)
            .fail_at(FailurePoint::MalformedAfter(0))
            .build();
        let handle = backend.open().unwrap();
        backend.configure(handle, &two_channels(0.001)).unwrap();
        backend.start(handle).unwrap();
        let err = backend.read_batch(handle, 100, Duration::from_millis(5)).unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::MalformedBatch);
    }

    #[test]
    fn test_call_log_records_order() {
        let mut backend = MockBackend::builder().fail_at(FailurePoint::Configure).build();
        let log = backend.call_log();
        let handle = backend.open().unwrap();
        assert!(backend.configure(handle, &two_channels(0.01)).is_err());
        backend.close(handle);

        let calls = log.lock().clone();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], BackendCall::Open);
        assert!(matches!(calls[1], BackendCall::Configure { num_channels: 2, .. }));
        assert_eq!(calls[2], BackendCall::Close);
    }

    #[test]
    fn test_realtime_pacing_times_out_before_first_scan() {
        let mut backend = MockBackend::builder().max_scan_rate(10.0).build();
        let handle = backend.open().unwrap();
        backend.configure(handle, &two_channels(0.1)).unwrap();
        backend.start(handle).unwrap();
        let err = backend.read_batch(handle, 10, Duration::from_millis(10)).unwrap_err();
        assert!(err.is_timeout());
    }
}
