//! # DAQ Recorder Core Library
//!
//! This crate is the core library for the `daq-recorder` application: a continuous,
//! unbounded analog recorder whose waveform can be panned and zoomed while it is
//! still growing. The library holds all acquisition, storage and view logic so the
//! CLI (`main.rs`) and the optional egui front end share one implementation.
//!
//! ## Crate Structure
//!
//! - **`hardware`**: The `AcquisitionBackend` capability trait, raw scan batches and
//!   the simulated `MockBackend`.
//! - **`data`**: Oversampling `Decimator`, the `HandoffBuffer` shared with the
//!   acquisition thread, the append-only `TimeSeriesStore` and CSV persistence.
//! - **`acquisition`**: `AcquisitionController`, the state machine that owns the
//!   acquisition worker thread and reports lifecycle events.
//! - **`view`**: Zoom history with nice-axis snapping and live right-edge tracking,
//!   the per-pixel min/max renderer and grid computation.
//! - **`session`**: `RecorderSession`, the presentation-side owner that wires the
//!   pieces together and rate limits redraws.
//! - **`config`** / **`validation`**: Figment-backed configuration and its checks.
//! - **`error`**: The `DaqError` enum used across the crate.
//! - **`logging`**: `tracing-subscriber` initialization.
//! - **`timestamp`**: Memory-mapped publication of the live recording position.
//!
//! ## Data flow
//!
//! ```text
//! AcquisitionBackend -> Decimator -> HandoffBuffer -> TimeSeriesStore -> DecimatingRenderer
//!        (acquisition worker thread)     |  (presentation thread, drain on accepted tick)
//! ```

pub mod acquisition;
pub mod config;
pub mod data;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod session;
pub mod timestamp;
pub mod validation;
pub mod view;

#[cfg(feature = "gui")]
pub mod gui;

pub use acquisition::{AcquisitionController, AcquisitionState, EventReceiver, SessionEvent};
pub use config::RecorderConfig;
pub use data::{ChannelId, TimeSeriesStore};
pub use error::{AppResult, DaqError};
pub use session::RecorderSession;
