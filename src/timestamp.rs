//! Live recording position for external tools.
//!
//! While recording, a small memory-mapped file holds the time of the newest sample as
//! fixed-point text, space padded to a constant width. Readers poll it; when the file
//! does not exist nothing is being recorded.
//!
//! ```text
//! $ cat ~/.daq_recorder_timestamp
//! 12.340000
//! ```

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};
use tracing::{debug, warn};

use crate::error::AppResult;

/// Size of the timestamp file in bytes.
pub const TIMESTAMP_WIDTH: usize = 32;

/// Writer side of the timestamp file. The file is removed on drop.
pub struct TimestampPublisher {
    path: PathBuf,
    mmap: MmapMut,
}

impl TimestampPublisher {
    /// Create (or truncate) the timestamp file and map it.
    #[allow(unsafe_code)]
    pub fn create<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(TIMESTAMP_WIDTH as u64)?;

        // SAFETY: the file was just created with a fixed length and is only written
        // through this mapping; external readers treat it as read-only text.
        let mmap = unsafe { MmapOptions::new().len(TIMESTAMP_WIDTH).map_mut(&file)? };

        let mut publisher = Self { path, mmap };
        publisher.publish(0.0)?;
        debug!(path = %publisher.path.display(), "Timestamp file created");
        Ok(publisher)
    }

    /// Overwrite the file with `time` (seconds, six decimals).
    pub fn publish(&mut self, time: f64) -> AppResult<()> {
        let text = format!("{time:<width$.6}", width = TIMESTAMP_WIDTH);
        let bytes = text.as_bytes();
        let len = bytes.len().min(TIMESTAMP_WIDTH);
        self.mmap[..len].copy_from_slice(&bytes[..len]);
        self.mmap.flush_async()?;
        Ok(())
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TimestampPublisher {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Could not remove timestamp file");
        }
    }
}

/// Read the published time, or `None` when nothing is being recorded.
pub fn read_timestamp<P: AsRef<Path>>(path: P) -> Option<f64> {
    let text = fs::read_to_string(path).ok()?;
    text.trim().parse().ok()
}
