//! Acquisition lifecycle: the controller state machine, its events and the redraw
//! rate limiter used by the presentation side.

pub mod controller;
pub mod rate_limiter;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

pub use controller::AcquisitionController;
pub use rate_limiter::UpdateLimiter;

/// Controller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    /// No session; settings may change
    Idle,
    /// Opening and configuring the backend
    Configuring,
    /// Reading data
    Running,
    /// Tearing the backend down
    Stopping,
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Configuring => "Configuring",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
        };
        f.write_str(name)
    }
}

/// A backend failure reported from the acquisition worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionFailure {
    /// Native error code
    pub code: i32,
    /// Human readable description
    pub message: String,
    /// The backend command that failed
    pub command: String,
}

impl fmt::Display for AcquisitionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: \"{}\"\nWhile processing command:\n\"{}\"",
            self.code, self.message, self.command
        )
    }
}

/// Lifecycle events delivered from the acquisition worker.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Acquisition is running with the given effective sample interval.
    Started {
        /// Effective seconds between decimated samples
        dt: f64,
        /// Raw scans averaged per decimated sample
        oversampling: usize,
    },
    /// The worker has torn the backend down and gone idle.
    Stopped,
    /// Decimated samples are waiting in the handoff buffer.
    NewDataAvailable,
    /// A configuration or fatal read failure.
    Error(AcquisitionFailure),
}

/// Receiving end of the controller's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Cooperative cancellation token checked by the read loop between backend reads.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    /// Fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Has cancellation been requested?
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
