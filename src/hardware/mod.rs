//! Acquisition hardware abstraction.
//!
//! The recorder talks to hardware exclusively through the [`AcquisitionBackend`]
//! capability trait. Backends deliver channel-interleaved [`RawBatch`]es; everything
//! downstream (oversampling, handoff, storage) is backend agnostic.
//!
//! Only the simulated [`MockBackend`] ships with the crate. A driver for real
//! converter hardware implements the same trait.

pub mod backend;
pub mod mock;
pub mod raw;

pub use backend::{
    AcquisitionBackend, BackendError, BackendErrorKind, ChannelConfig, DeviceHandle,
};
pub use mock::{create_backend, BackendCall, CallLog, FailurePoint, MockBackend, MockBackendBuilder};
pub use raw::{RawBatch, SampleRange};
