//! Presentation-side recording session.
//!
//! `RecorderSession` owns everything the display thread works with: the permanent
//! [`TimeSeriesStore`], the [`ZoomStack`], the redraw [`UpdateLimiter`] and the
//! document state. It drives an [`AcquisitionController`] and turns the controller's
//! events into [`SessionNotice`]s for whichever front end is attached.
//!
//! ## Data flow
//!
//! The acquisition worker only ever appends to the shared handoff buffer. The session
//! drains that buffer into the store when the limiter accepts a "new data"
//! notification, and unconditionally when the worker reports that it stopped, so no
//! acquired sample is left behind.
//!
//! ## Document state
//!
//! A session starts "saved". The first data drained after a save marks it unsaved
//! and records the recording start time, which also names the suggested file.
//! Operations that would throw unsaved data away require [`Discard::Yes`].

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info, warn};

use crate::acquisition::{
    AcquisitionController, AcquisitionState, EventReceiver, SessionEvent, UpdateLimiter,
};
use crate::config::RecorderConfig;
use crate::data::{self, HandoffBuffer, TimeSeriesStore};
use crate::error::{AppResult, DaqError};
use crate::hardware::{create_backend, AcquisitionBackend};
use crate::timestamp::TimestampPublisher;
use crate::view::{DecimatingRenderer, GridLines, PixelRect, PlotArea, Polyline, ZoomStack};

/// Poll interval used by [`RecorderSession::wait_until_idle`].
const IDLE_POLL: Duration = Duration::from_millis(5);

/// What the front end should react to after [`RecorderSession::poll_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// Recording began
    Started,
    /// Recording ended; all acquired data is in the store
    Stopped,
    /// New data was drained; the view should be redrawn
    Redraw,
    /// An acquisition error to show the operator
    Error(String),
}

/// Whether an operation may throw away unsaved data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    /// Discard unsaved data
    Yes,
    /// Refuse when data is unsaved
    No,
}

/// One recorder document plus the acquisition driving it.
pub struct RecorderSession {
    config: RecorderConfig,
    store: TimeSeriesStore,
    zoom: ZoomStack,
    controller: AcquisitionController,
    events: EventReceiver,
    handoff: Arc<HandoffBuffer>,
    limiter: UpdateLimiter,
    dt: f64,
    trace_offset: f64,
    saved: bool,
    start_time: Option<DateTime<Utc>>,
    timestamp: Option<TimestampPublisher>,
    deferred: Vec<SessionNotice>,
}

impl RecorderSession {
    /// Session using the backend named by the configuration.
    pub fn from_config(config: RecorderConfig) -> AppResult<Self> {
        config.validate()?;
        let backend = create_backend(&config.backend);
        Ok(Self::new(config, backend))
    }

    /// Session driving `backend`.
    pub fn new(config: RecorderConfig, backend: Box<dyn AcquisitionBackend>) -> Self {
        let (controller, events) = AcquisitionController::new(backend, config.acquisition.clone());
        let (min_y, max_y) = config.acquisition.display_range();
        Self {
            store: TimeSeriesStore::new(),
            zoom: ZoomStack::new(min_y, max_y),
            handoff: controller.handoff(),
            controller,
            events,
            limiter: UpdateLimiter::new(config.display.render_interval()),
            dt: config.acquisition.dt(),
            trace_offset: 0.0,
            saved: true,
            start_time: None,
            timestamp: None,
            deferred: Vec::new(),
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// The recorded data.
    pub fn store(&self) -> &TimeSeriesStore {
        &self.store
    }

    /// The zoom history.
    pub fn zoom(&self) -> &ZoomStack {
        &self.zoom
    }

    /// Acquisition state.
    pub fn state(&self) -> AcquisitionState {
        self.controller.state()
    }

    /// True from start until the worker has gone idle.
    pub fn is_recording(&self) -> bool {
        self.controller.is_running()
    }

    /// Samples acquired but not yet drained into the store.
    pub fn pending_scans(&self) -> usize {
        self.handoff.pending_scans()
    }

    /// Current vertical separation between channels, volts.
    pub fn trace_offset(&self) -> f64 {
        self.trace_offset
    }

    /// Start recording, or request a stop when already recording.
    pub fn toggle_recording(&mut self) -> AppResult<()> {
        if self.controller.is_running() {
            self.controller.stop()
        } else {
            self.start_recording()
        }
    }

    /// Start recording. New data is appended after whatever the store already holds.
    pub fn start_recording(&mut self) -> AppResult<()> {
        // The previous run's tail must reach the store before the handoff is reset.
        if !self.controller.is_running() {
            self.controller.wait()?;
            let notices = self.poll_events();
            self.deferred.extend(notices);
        }
        self.controller.start()?;
        self.limiter.reset();
        Ok(())
    }

    /// Request a stop; completion arrives as [`SessionNotice::Stopped`].
    pub fn stop_recording(&self) -> AppResult<()> {
        self.controller.stop()
    }

    /// Process pending controller events.
    pub fn poll_events(&mut self) -> Vec<SessionNotice> {
        let mut notices = std::mem::take(&mut self.deferred);
        while let Ok(event) = self.events.try_recv() {
            match event {
                SessionEvent::Started { dt, oversampling } => {
                    debug!(dt, oversampling, "Session started");
                    self.dt = dt;
                    self.open_timestamp();
                    notices.push(SessionNotice::Started);
                }
                SessionEvent::NewDataAvailable => {
                    if self.limiter.should_update() && self.drain() > 0 {
                        push_redraw(&mut notices);
                    }
                }
                SessionEvent::Stopped => {
                    if self.drain() > 0 {
                        push_redraw(&mut notices);
                    }
                    self.timestamp = None;
                    notices.push(SessionNotice::Stopped);
                }
                SessionEvent::Error(failure) => {
                    notices.push(SessionNotice::Error(failure.to_string()));
                }
            }
        }
        notices
    }

    /// Poll until the acquisition worker has exited, or `timeout` elapses.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> AppResult<Vec<SessionNotice>> {
        let deadline = Instant::now() + timeout;
        let mut notices = Vec::new();
        loop {
            notices.extend(self.poll_events());
            if !self.controller.is_running() {
                self.controller.wait()?;
                notices.extend(self.poll_events());
                return Ok(notices);
            }
            if Instant::now() >= deadline {
                return Ok(notices);
            }
            thread::sleep(IDLE_POLL);
        }
    }

    fn drain(&mut self) -> usize {
        let old_last = self.store.latest_time();
        let scans = self.handoff.drain_into(&mut self.store, self.dt);
        if scans == 0 {
            return 0;
        }
        if self.saved {
            self.start_time = Some(Utc::now());
            self.saved = false;
        }
        let new_last = self.store.latest_time();
        self.zoom.on_data_growth(old_last, new_last);
        if let (Some(publisher), Some(last)) = (self.timestamp.as_mut(), new_last) {
            if let Err(e) = publisher.publish(last) {
                warn!(error = %e, "Could not publish recording position");
            }
        }
        scans
    }

    fn open_timestamp(&mut self) {
        if !self.config.timestamp.enabled {
            return;
        }
        let Some(path) = self.config.timestamp.resolved_path() else {
            return;
        };
        match TimestampPublisher::create(&path) {
            Ok(publisher) => self.timestamp = Some(publisher),
            Err(e) => warn!(path = %path.display(), error = %e, "Timestamp file unavailable"),
        }
    }

    /// True when data arrived since the last save, open or new document.
    pub fn has_unsaved_data(&self) -> bool {
        !self.saved
    }

    /// When the unsaved recording started.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    /// File name derived from the recording start time, e.g. `2024-05-01T123456Z.csv`.
    pub fn suggested_filename(&self) -> String {
        let start = self.start_time.unwrap_or_else(Utc::now);
        let iso = start.to_rfc3339_opts(SecondsFormat::Secs, true);
        format!("{}.csv", iso.replace(':', ""))
    }

    fn check_discard(&self, operation: &'static str, discard: Discard) -> AppResult<()> {
        let state = self.controller.state();
        if state != AcquisitionState::Idle {
            return Err(DaqError::InvalidState { operation, state });
        }
        if self.has_unsaved_data() && discard == Discard::No {
            return Err(DaqError::UnsavedData(operation));
        }
        Ok(())
    }

    /// Clear all data and zoom history.
    pub fn new_document(&mut self, discard: Discard) -> AppResult<()> {
        self.check_discard("new document", discard)?;
        self.store.clear();
        self.zoom.clear();
        self.saved = true;
        self.start_time = None;
        info!("New document");
        Ok(())
    }

    /// Replace the data with a saved series and fit the view to it.
    pub fn open<P: AsRef<Path>>(&mut self, path: P, discard: Discard) -> AppResult<()> {
        self.check_discard("open", discard)?;
        let store = data::load_series(path)?;
        self.store = store;
        self.zoom.clear();
        self.zoom.reset_to_fit(self.store.latest_time());
        self.saved = true;
        self.start_time = None;
        Ok(())
    }

    /// Write the data as CSV and mark the document saved. Returns rows written.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> AppResult<usize> {
        let rows = data::save_series(&self.store, path)?;
        self.saved = true;
        Ok(rows)
    }

    /// Switch channel stacking on or off.
    pub fn toggle_trace_offset(&mut self) {
        self.trace_offset = if self.trace_offset == 0.0 {
            self.config.display.trace_offset_step
        } else {
            0.0
        };
    }

    /// Replace the configuration. Only allowed while idle.
    pub fn update_settings(&mut self, config: RecorderConfig) -> AppResult<()> {
        config.validate()?;
        self.controller.update_settings(config.acquisition.clone())?;
        let (min_y, max_y) = config.acquisition.display_range();
        self.zoom.set_y_range(min_y, max_y);
        self.limiter = UpdateLimiter::new(config.display.render_interval());
        self.dt = config.acquisition.dt();
        if self.trace_offset != 0.0 {
            self.trace_offset = config.display.trace_offset_step;
        }
        self.config = config;
        Ok(())
    }

    /// Polylines for the current window.
    pub fn render(&self, area: &PlotArea) -> Vec<Polyline> {
        DecimatingRenderer::new(self.zoom.current(), area).render(
            &self.store,
            self.trace_offset,
            &self.config.display,
        )
    }

    /// Tick lines for the current window.
    pub fn grid(&self, area: &PlotArea) -> GridLines {
        GridLines::compute(self.zoom.current(), area)
    }

    /// Zoom to a rubber band selection. Returns false when it was too small.
    pub fn zoom_to(&mut self, rect: PixelRect, area: &PlotArea) -> bool {
        let last = self.store.latest_time();
        self.zoom.push_zoom(rect, area, last)
    }

    /// Move one step deeper into the zoom history.
    pub fn zoom_in(&mut self) -> bool {
        let last = self.store.latest_time();
        self.zoom.zoom_in(last)
    }

    /// Move one step out of the zoom history.
    pub fn zoom_out(&mut self) -> bool {
        let last = self.store.latest_time();
        self.zoom.zoom_out(last)
    }

    /// Pan by whole ticks.
    pub fn scroll(&mut self, dx_ticks: f64, dy_ticks: f64) {
        self.zoom.scroll(dx_ticks, dy_ticks);
    }
}

fn push_redraw(notices: &mut Vec<SessionNotice>) {
    if !notices.contains(&SessionNotice::Redraw) {
        notices.push(SessionNotice::Redraw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WaveformKind;
    use crate::data::ChannelId;
    use crate::hardware::MockBackend;

    fn session() -> RecorderSession {
        let backend = MockBackend::builder()
            .max_scan_rate(1_000.0)
            .realtime(false)
            .waveform(WaveformKind::Constant)
            .amplitude(1.0)
            .scan_budget(100)
            .build();
        RecorderSession::new(RecorderConfig::default(), Box::new(backend))
    }

    fn record(session: &mut RecorderSession) {
        session.start_recording().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while session.store().total_points() + 2 * session.pending_scans() < 20
            && Instant::now() < deadline
        {
            session.poll_events();
            thread::sleep(Duration::from_millis(2));
        }
        session.stop_recording().unwrap();
        session.wait_until_idle(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn test_record_marks_unsaved_and_names_file() {
        let mut session = session();
        assert!(!session.has_unsaved_data());
        record(&mut session);

        assert!(session.has_unsaved_data());
        assert_eq!(session.store().series(ChannelId::new(0).unwrap()).unwrap().len(), 10);
        let name = session.suggested_filename();
        assert!(name.ends_with("Z.csv"));
        assert!(!name.contains(':'));
    }

    #[test]
    fn test_discard_guard() {
        let mut session = session();
        record(&mut session);

        let err = session.new_document(Discard::No).unwrap_err();
        assert!(matches!(err, DaqError::UnsavedData("new document")));
        session.new_document(Discard::Yes).unwrap();
        assert!(session.store().is_empty());
        assert!(!session.has_unsaved_data());
    }

    #[test]
    fn test_save_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");

        let mut session = session();
        record(&mut session);
        assert_eq!(session.save(&path).unwrap(), 9);
        assert!(!session.has_unsaved_data());

        session.open(&path, Discard::No).unwrap();
        assert_eq!(session.store().series(ChannelId::new(1).unwrap()).unwrap().len(), 9);
        assert!((session.zoom().fit_window().max_x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_trace_offset_toggle() {
        let mut session = session();
        session.toggle_trace_offset();
        assert_eq!(session.trace_offset(), 0.1);
        session.toggle_trace_offset();
        assert_eq!(session.trace_offset(), 0.0);
    }

    #[test]
    fn test_settings_locked_while_recording() {
        let backend = MockBackend::builder().max_scan_rate(1_000.0).build();
        let mut session = RecorderSession::new(RecorderConfig::default(), Box::new(backend));
        session.toggle_recording().unwrap();
        let err = session.update_settings(RecorderConfig::default()).unwrap_err();
        assert!(matches!(err, DaqError::InvalidState { .. }));
        session.toggle_recording().unwrap();
        let notices = session.wait_until_idle(Duration::from_secs(5)).unwrap();
        assert_eq!(notices.last(), Some(&SessionNotice::Stopped));
        assert!(session.update_settings(RecorderConfig::default()).is_ok());
    }
}
