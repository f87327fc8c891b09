//! Sample processing and storage.
//!
//! Raw scans are reduced by the [`Decimator`] on the acquisition thread, parked in
//! the [`HandoffBuffer`], and drained by the presentation thread into the
//! append-only [`TimeSeriesStore`].
pub mod csv_io;
pub mod decimator;
pub mod handoff;
pub mod series;

use std::fmt;

use crate::config::MAX_CHANNELS;

pub use csv_io::{load_series, read_series, save_series, write_series};
pub use decimator::Decimator;
pub use handoff::HandoffBuffer;
pub use series::{SeriesPoint, TimeSeries, TimeSeriesStore};

/// Logical acquisition channel, `0 <= id < MAX_CHANNELS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(u8);

impl ChannelId {
    /// Channel for `index`, or `None` past the channel limit.
    pub fn new(index: usize) -> Option<Self> {
        if index < MAX_CHANNELS {
            u8::try_from(index).ok().map(Self)
        } else {
            None
        }
    }

    /// Zero-based index.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// The first `count` channels (clamped to the channel limit).
    pub fn first(count: usize) -> impl Iterator<Item = ChannelId> {
        (0..count.min(MAX_CHANNELS)).filter_map(Self::new)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}
