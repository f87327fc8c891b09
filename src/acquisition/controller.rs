//! Acquisition controller and its worker thread.
//!
//! The controller owns the backend between sessions and lends it to a dedicated
//! worker thread while a session runs:
//!
//! ```text
//! Idle --start()--> Configuring --backend ready--> Running --stop()/fatal--> Stopping --> Idle
//!                        |                                                          ^
//!                        +-------------- setup failure (Error event) ---------------+
//! ```
//!
//! The worker reads raw batches, averages them with a [`Decimator`] and appends the
//! result to the shared [`HandoffBuffer`]. It never touches the time series store;
//! everything it has to say travels as a [`SessionEvent`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::acquisition::{
    AcquisitionFailure, AcquisitionState, EventReceiver, SessionEvent, StopToken,
};
use crate::config::AcquisitionSettings;
use crate::data::{Decimator, HandoffBuffer};
use crate::error::{AppResult, DaqError};
use crate::hardware::{AcquisitionBackend, BackendError, ChannelConfig, DeviceHandle};

/// State visible to both the controller and its worker.
#[derive(Debug)]
struct Status {
    state: AcquisitionState,
    effective_dt: Option<f64>,
}

type SharedStatus = Arc<Mutex<Status>>;

/// Drives one backend through repeated acquisition sessions.
pub struct AcquisitionController {
    settings: AcquisitionSettings,
    status: SharedStatus,
    handoff: Arc<HandoffBuffer>,
    events: mpsc::UnboundedSender<SessionEvent>,
    stop_token: StopToken,
    backend: Option<Box<dyn AcquisitionBackend>>,
    worker: Option<JoinHandle<Box<dyn AcquisitionBackend>>>,
}

impl AcquisitionController {
    /// Create an idle controller and the receiver for its events.
    pub fn new(
        backend: Box<dyn AcquisitionBackend>,
        settings: AcquisitionSettings,
    ) -> (Self, EventReceiver) {
        let (events, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            handoff: Arc::new(HandoffBuffer::new(settings.num_channels)),
            settings,
            status: Arc::new(Mutex::new(Status {
                state: AcquisitionState::Idle,
                effective_dt: None,
            })),
            events,
            stop_token: StopToken::new(),
            backend: Some(backend),
            worker: None,
        };
        (controller, receiver)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AcquisitionState {
        self.status.lock().state
    }

    /// True from `start()` until the worker has gone idle again.
    pub fn is_running(&self) -> bool {
        self.state() != AcquisitionState::Idle
    }

    /// Settings used by the next session.
    pub fn settings(&self) -> &AcquisitionSettings {
        &self.settings
    }

    /// Replace the settings. Only allowed while idle.
    pub fn update_settings(&mut self, settings: AcquisitionSettings) -> AppResult<()> {
        let state = self.state();
        if state != AcquisitionState::Idle {
            return Err(DaqError::InvalidState {
                operation: "update settings",
                state,
            });
        }
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    /// Buffer the worker appends decimated samples to.
    pub fn handoff(&self) -> Arc<HandoffBuffer> {
        Arc::clone(&self.handoff)
    }

    /// Effective sample interval of the current (or last) session.
    pub fn effective_dt(&self) -> Option<f64> {
        self.status.lock().effective_dt
    }

    /// Start a session on the worker thread. Only allowed while idle.
    ///
    /// Backend setup failures are reported asynchronously as `SessionEvent::Error`.
    pub fn start(&mut self) -> AppResult<()> {
        let state = self.state();
        if state != AcquisitionState::Idle {
            return Err(DaqError::InvalidState {
                operation: "start",
                state,
            });
        }
        self.settings.validate()?;
        self.wait()?;
        let backend = self.backend.take().ok_or(DaqError::WorkerPanicked)?;

        info!(
            backend = backend.name(),
            channels = self.settings.num_channels,
            rate_hz = self.settings.sampling_rate,
            "Starting acquisition"
        );

        self.handoff.reset(self.settings.num_channels);
        self.stop_token = StopToken::new();
        {
            let mut status = self.status.lock();
            status.state = AcquisitionState::Configuring;
            status.effective_dt = None;
        }

        let worker = Worker {
            backend,
            settings: self.settings.clone(),
            status: Arc::clone(&self.status),
            handoff: Arc::clone(&self.handoff),
            events: self.events.clone(),
            stop: self.stop_token.clone(),
        };
        let spawned = thread::Builder::new()
            .name("acquisition".to_string())
            .spawn(move || worker.run());
        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.status.lock().state = AcquisitionState::Idle;
                Err(e.into())
            }
        }
    }

    /// Ask the worker to stop. Does not block; completion is signalled by
    /// `SessionEvent::Stopped` or by [`wait`](Self::wait).
    pub fn stop(&self) -> AppResult<()> {
        let state = self.state();
        if state == AcquisitionState::Idle {
            return Err(DaqError::InvalidState {
                operation: "stop",
                state,
            });
        }
        debug!(%state, "Stop requested");
        self.stop_token.cancel();
        Ok(())
    }

    /// Block until the worker thread exits and take the backend back.
    pub fn wait(&mut self) -> AppResult<()> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(backend) => {
                self.backend = Some(backend);
                Ok(())
            }
            Err(_) => {
                error!("Acquisition worker panicked");
                self.status.lock().state = AcquisitionState::Idle;
                Err(DaqError::WorkerPanicked)
            }
        }
    }
}

impl Drop for AcquisitionController {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.take() {
            self.stop_token.cancel();
            if handle.join().is_err() {
                warn!("Acquisition worker panicked during shutdown");
            }
        }
    }
}

/// Timing negotiated with the backend for one session.
#[derive(Debug, Clone, Copy)]
struct SessionTiming {
    dt: f64,
    oversampling: usize,
    scans_per_read: usize,
}

/// Everything the worker thread owns for one session.
struct Worker {
    backend: Box<dyn AcquisitionBackend>,
    settings: AcquisitionSettings,
    status: SharedStatus,
    handoff: Arc<HandoffBuffer>,
    events: mpsc::UnboundedSender<SessionEvent>,
    stop: StopToken,
}

impl Worker {
    fn run(mut self) -> Box<dyn AcquisitionBackend> {
        let handle = match self.backend.open() {
            Ok(handle) => handle,
            Err(e) => {
                self.fail_setup(&e, "open device".to_string());
                return self.backend;
            }
        };

        let timing = match self.setup(handle) {
            Ok(timing) => timing,
            Err((e, command)) => {
                self.backend.close(handle);
                self.fail_setup(&e, command);
                return self.backend;
            }
        };

        {
            let mut status = self.status.lock();
            status.state = AcquisitionState::Running;
            status.effective_dt = Some(timing.dt);
        }
        info!(
            dt = timing.dt,
            oversampling = timing.oversampling,
            scans_per_read = timing.scans_per_read,
            "Acquisition running"
        );
        self.send(SessionEvent::Started {
            dt: timing.dt,
            oversampling: timing.oversampling,
        });

        self.read_loop(handle, timing);
        self.teardown(handle);
        self.backend
    }

    fn setup(&mut self, handle: DeviceHandle) -> Result<SessionTiming, (BackendError, String)> {
        let num_channels = self.settings.num_channels;
        let dt = self.settings.dt();
        let oversampling = Decimator::factor_for(self.backend.max_scan_rate(num_channels), dt);

        let config = ChannelConfig {
            num_channels,
            scan_interval: dt / oversampling as f64,
            min_voltage: (0..num_channels).map(|c| self.settings.voltage_range(c).0).collect(),
            max_voltage: (0..num_channels).map(|c| self.settings.voltage_range(c).1).collect(),
        };
        let command = config.describe();
        let achieved = self
            .backend
            .configure(handle, &config)
            .map_err(|e| (e, command.clone()))?;
        if !achieved.is_finite() || achieved <= 0.0 {
            return Err((
                BackendError::configuration(0, format!("Unusable scan interval {achieved}")),
                command,
            ));
        }
        if (achieved - config.scan_interval).abs() > 1e-12 {
            debug!(
                requested = config.scan_interval,
                achieved, "Backend coerced scan interval"
            );
        }

        self.backend
            .start(handle)
            .map_err(|e| (e, "start acquisition".to_string()))?;

        let per_read = self.settings.update_interval().as_secs_f64() / achieved;
        Ok(SessionTiming {
            dt: achieved * oversampling as f64,
            oversampling,
            scans_per_read: (per_read.round() as usize).max(1),
        })
    }

    fn read_loop(&mut self, handle: DeviceHandle, timing: SessionTiming) {
        let num_channels = self.settings.num_channels;
        let timeout: Duration = self.settings.read_timeout();
        let command = format!("read up to {} scans", timing.scans_per_read);
        let mut decimator = Decimator::new(num_channels, timing.oversampling);

        loop {
            if self.stop.is_cancelled() {
                self.backend.cancel(handle);
                break;
            }

            match self.backend.read_batch(handle, timing.scans_per_read, timeout) {
                Ok(batch) if batch.is_empty() => {}
                Ok(batch) if batch.num_channels() != num_channels => {
                    let e = BackendError::malformed_batch(format!(
                        "Batch has {} channels, expected {num_channels}",
                        batch.num_channels()
                    ));
                    self.fail_read(&e, &command);
                }
                Ok(batch) => {
                    let columns = decimator.process(&batch);
                    let produced = columns.first().map_or(0, Vec::len);
                    trace!(raw = batch.num_scans(), produced, "Batch decimated");
                    if produced > 0 {
                        self.handoff.append_batch(&columns);
                        self.send(SessionEvent::NewDataAvailable);
                    }
                }
                Err(e) if e.is_timeout() => trace!("Read timed out"),
                Err(e) => self.fail_read(&e, &command),
            }
        }

        if decimator.pending_scans() > 0 {
            debug!(
                discarded = decimator.pending_scans(),
                "Discarding partial oversampling block"
            );
        }
    }

    fn teardown(&mut self, handle: DeviceHandle) {
        self.status.lock().state = AcquisitionState::Stopping;
        self.backend.stop(handle);
        self.backend.close(handle);
        self.status.lock().state = AcquisitionState::Idle;
        info!("Acquisition stopped");
        self.send(SessionEvent::Stopped);
    }

    fn fail_setup(&self, e: &BackendError, command: String) {
        error!(code = e.code, error = %e, %command, "Acquisition setup failed");
        self.status.lock().state = AcquisitionState::Idle;
        self.send(SessionEvent::Error(AcquisitionFailure {
            code: e.code,
            message: e.message.clone(),
            command,
        }));
    }

    fn fail_read(&self, e: &BackendError, command: &str) {
        error!(code = e.code, error = %e, "Acquisition aborted");
        self.send(SessionEvent::Error(AcquisitionFailure {
            code: e.code,
            message: e.message.clone(),
            command: command.to_string(),
        }));
        self.stop.cancel();
    }

    fn send(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }
}
