//! Block-averaging oversampler.

use crate::hardware::RawBatch;

/// Reduces raw scans to the requested effective rate by averaging blocks of `k` scans.
///
/// Accumulators persist across batches so block boundaries need not line up with
/// read boundaries. A partial block left over when acquisition stops is discarded.
#[derive(Debug, Clone)]
pub struct Decimator {
    factor: usize,
    sums: Vec<f64>,
    pending: usize,
}

impl Decimator {
    /// Decimator for `num_channels` channels averaging `factor` scans (at least 1).
    pub fn new(num_channels: usize, factor: usize) -> Self {
        Self {
            factor: factor.max(1),
            sums: vec![0.0; num_channels],
            pending: 0,
        }
    }

    /// Oversampling factor `k = round(raw_rate * dt)`, at least 1.
    pub fn factor_for(raw_rate: f64, dt: f64) -> usize {
        let k = (raw_rate * dt).round();
        if k.is_finite() && k >= 1.0 {
            k as usize
        } else {
            1
        }
    }

    /// Averaging factor.
    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Channels per scan.
    pub fn num_channels(&self) -> usize {
        self.sums.len()
    }

    /// Raw scans accumulated toward the next output.
    pub fn pending_scans(&self) -> usize {
        self.pending
    }

    /// Feed one batch; returns the completed averages, one vector per channel.
    ///
    /// Every channel vector has the same length.
    pub fn process(&mut self, batch: &RawBatch) -> Vec<Vec<f64>> {
        let capacity = (self.pending + batch.num_scans()) / self.factor;
        let mut out: Vec<Vec<f64>> = (0..self.sums.len())
            .map(|_| Vec::with_capacity(capacity))
            .collect();
        let divisor = self.factor as f64;

        for scan in batch.scans() {
            for (sum, &value) in self.sums.iter_mut().zip(scan) {
                *sum += value;
            }
            self.pending += 1;
            if self.pending == self.factor {
                for (column, sum) in out.iter_mut().zip(self.sums.iter_mut()) {
                    column.push(*sum / divisor);
                    *sum = 0.0;
                }
                self.pending = 0;
            }
        }
        out
    }

    /// Drop any partial block.
    pub fn reset(&mut self) {
        self.sums.iter_mut().for_each(|s| *s = 0.0);
        self.pending = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(values: &[f64]) -> RawBatch {
        RawBatch::new(values.to_vec(), 1).unwrap()
    }

    #[test]
    fn test_factor_for() {
        assert_eq!(Decimator::factor_for(1_000.0, 0.01), 10);
        assert_eq!(Decimator::factor_for(125_000.0, 0.0001), 13);
        assert_eq!(Decimator::factor_for(100.0, 0.001), 1);
        assert_eq!(Decimator::factor_for(f64::NAN, 0.01), 1);
    }

    #[test]
    fn test_pass_through() {
        let mut decimator = Decimator::new(2, 1);
        let raw = RawBatch::new(vec![1.0, -1.0, 2.0, -2.0], 2).unwrap();
        assert_eq!(decimator.process(&raw), vec![vec![1.0, 2.0], vec![-1.0, -2.0]]);
    }

    #[test]
    fn test_means_span_batches() {
        let mut decimator = Decimator::new(1, 4);
        assert_eq!(decimator.process(&batch(&[1.0, 2.0, 3.0])), vec![Vec::<f64>::new()]);
        assert_eq!(decimator.pending_scans(), 3);
        let out = decimator.process(&batch(&[4.0, 10.0, 10.0, 10.0, 10.0, 7.0]));
        assert_eq!(out, vec![vec![2.5, 10.0]]);
        assert_eq!(decimator.pending_scans(), 1);
    }

    #[test]
    fn test_output_length_is_floor() {
        for k in 1..=7 {
            let mut decimator = Decimator::new(1, k);
            let values: Vec<f64> = (0..100).map(f64::from).collect();
            let out = decimator.process(&batch(&values));
            assert_eq!(out[0].len(), 100 / k);
            for (i, mean) in out[0].iter().enumerate() {
                let block = &values[i * k..(i + 1) * k];
                let expected = block.iter().sum::<f64>() / k as f64;
                assert!((mean - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_reset_discards_partial_block() {
        let mut decimator = Decimator::new(1, 2);
        decimator.process(&batch(&[100.0]));
        decimator.reset();
        assert_eq!(decimator.process(&batch(&[1.0, 3.0])), vec![vec![2.0]]);
    }
}
