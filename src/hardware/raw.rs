//! Raw scan batches as delivered by a backend.

use crate::hardware::backend::BackendError;

/// Linear mapping from converter codes to volts for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRange {
    /// Voltage at code 0
    pub min: f64,
    /// Voltage at `max_code`
    pub max: f64,
    /// Largest converter code
    pub max_code: u16,
}

impl SampleRange {
    /// 16-bit converter spanning `[min, max]`.
    pub fn new_16bit(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            max_code: u16::MAX,
        }
    }

    /// Convert one converter code to volts.
    pub fn to_physical(&self, code: u16) -> f64 {
        if self.max_code == 0 {
            return self.min;
        }
        self.min + (self.max - self.min) * f64::from(code) / f64::from(self.max_code)
    }
}

/// A run of scans, channel-interleaved in scan order:
/// `[scan0_ch0, scan0_ch1, ..., scan1_ch0, scan1_ch1, ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBatch {
    samples: Vec<f64>,
    num_channels: usize,
}

impl RawBatch {
    /// Wrap interleaved samples. The sample count must be a whole number of scans.
    pub fn new(samples: Vec<f64>, num_channels: usize) -> Result<Self, BackendError> {
        if num_channels == 0 {
            return Err(BackendError::malformed_batch("Batch has no channels"));
        }
        if samples.len() % num_channels != 0 {
            return Err(BackendError::malformed_batch(format!(
                "{} samples is not a whole number of {}-channel scans",
                samples.len(),
                num_channels
            )));
        }
        Ok(Self {
            samples,
            num_channels,
        })
    }

    /// A batch with no scans.
    pub fn empty(num_channels: usize) -> Self {
        Self {
            samples: Vec::new(),
            num_channels,
        }
    }

    /// Decode native-endian unsigned 16-bit converter codes, one range per channel.
    pub fn from_sample_bytes(bytes: &[u8], ranges: &[SampleRange]) -> Result<Self, BackendError> {
        if bytes.len() % 2 != 0 {
            return Err(BackendError::malformed_batch(format!(
                "Read an odd number of bytes ({})",
                bytes.len()
            )));
        }
        let num_channels = ranges.len();
        let samples = bytes
            .chunks_exact(2)
            .enumerate()
            .map(|(i, pair)| {
                let code = u16::from_ne_bytes([pair[0], pair[1]]);
                ranges
                    .get(i % num_channels.max(1))
                    .map_or(0.0, |range| range.to_physical(code))
            })
            .collect();
        Self::new(samples, num_channels)
    }

    /// Channels per scan.
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Number of complete scans.
    pub fn num_scans(&self) -> usize {
        self.samples.len() / self.num_channels.max(1)
    }

    /// True when the batch holds no scans.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Iterate scans; each item holds one sample per channel.
    pub fn scans(&self) -> impl Iterator<Item = &[f64]> {
        self.samples.chunks_exact(self.num_channels.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::BackendErrorKind;

    #[test]
    fn test_partial_scan_rejected() {
        let err = RawBatch::new(vec![1.0, 2.0, 3.0], 2).unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::MalformedBatch);
    }

    #[test]
    fn test_scans_split_interleaved_samples() {
        let batch = RawBatch::new(vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0], 2).unwrap();
        assert_eq!(batch.num_scans(), 3);
        assert_eq!(batch.scans().nth(1), Some(&[2.0, 20.0][..]));
    }

    #[test]
    fn test_odd_byte_count_rejected() {
        let ranges = [SampleRange::new_16bit(-10.0, 10.0)];
        let err = RawBatch::from_sample_bytes(&[0, 0, 0], &ranges).unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::MalformedBatch);
    }

    #[test]
    fn test_decode_codes() {
        let ranges = [
            SampleRange::new_16bit(-10.0, 10.0),
            SampleRange::new_16bit(0.0, 5.0),
        ];
        let mut bytes = Vec::new();
        for code in [0u16, u16::MAX, u16::MAX, 0] {
            bytes.extend_from_slice(&code.to_ne_bytes());
        }
        let batch = RawBatch::from_sample_bytes(&bytes, &ranges).unwrap();
        assert_eq!(batch.samples(), &[-10.0, 5.0, 10.0, 0.0]);
    }

    #[test]
    fn test_decode_partial_scan_rejected() {
        let ranges = [
            SampleRange::new_16bit(-10.0, 10.0),
            SampleRange::new_16bit(-10.0, 10.0),
        ];
        let err = RawBatch::from_sample_bytes(&[0, 0, 0, 0, 0, 0], &ranges).unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::MalformedBatch);
    }
}
