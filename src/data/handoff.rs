//! Producer/consumer handoff between the acquisition worker and the presentation thread.

use parking_lot::Mutex;
use tracing::warn;

use crate::data::series::TimeSeriesStore;
use crate::data::ChannelId;

/// Per-channel queue of decimated values awaiting transfer to the store.
///
/// The acquisition worker appends whole decimated batches under one lock; the
/// presentation thread swaps the queues out under the same lock and copies into the
/// store after releasing it. Capacity is unbounded.
#[derive(Debug, Default)]
pub struct HandoffBuffer {
    pending: Mutex<Vec<Vec<f64>>>,
}

impl HandoffBuffer {
    /// Buffer with one queue per channel.
    pub fn new(num_channels: usize) -> Self {
        Self {
            pending: Mutex::new(vec![Vec::new(); num_channels]),
        }
    }

    /// Resize for a new session. Undrained values are discarded.
    pub fn reset(&self, num_channels: usize) {
        let mut pending = self.pending.lock();
        let discarded: usize = pending.iter().map(Vec::len).sum();
        if discarded > 0 {
            warn!(discarded, "Discarding undrained samples from previous session");
        }
        *pending = vec![Vec::new(); num_channels];
    }

    /// Queue one value. Values for unknown channels are dropped.
    pub fn append(&self, channel: ChannelId, value: f64) {
        if let Some(queue) = self.pending.lock().get_mut(channel.index()) {
            queue.push(value);
        }
    }

    /// Queue one decimated batch (one column per channel) atomically.
    pub fn append_batch(&self, columns: &[Vec<f64>]) {
        let mut pending = self.pending.lock();
        for (queue, column) in pending.iter_mut().zip(columns) {
            queue.extend_from_slice(column);
        }
    }

    /// Scans waiting to be drained.
    pub fn pending_scans(&self) -> usize {
        self.pending.lock().iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Take everything queued, leaving the queues empty.
    pub fn take(&self) -> Vec<Vec<f64>> {
        let mut pending = self.pending.lock();
        pending.iter_mut().map(std::mem::take).collect()
    }

    /// Move everything queued into `store`, timestamped `dt` apart.
    ///
    /// Each channel continues one `dt` after its last stored point (or at 0 when
    /// empty). Returns the number of scans transferred.
    pub fn drain_into(&self, store: &mut TimeSeriesStore, dt: f64) -> usize {
        let taken = self.take();
        let mut scans = 0;
        for (index, values) in taken.iter().enumerate() {
            let Some(channel) = ChannelId::new(index) else {
                continue;
            };
            if values.is_empty() {
                continue;
            }
            store.append_values(channel, values, dt);
            scans = scans.max(values.len());
        }
        scans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn ch(index: usize) -> ChannelId {
        ChannelId::new(index).unwrap()
    }

    #[test]
    fn test_drain_assigns_evenly_spaced_times() {
        let buffer = HandoffBuffer::new(2);
        buffer.append_batch(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        let mut store = TimeSeriesStore::new();
        assert_eq!(buffer.drain_into(&mut store, 0.5), 2);

        buffer.append_batch(&[vec![5.0], vec![6.0]]);
        assert_eq!(buffer.drain_into(&mut store, 0.5), 1);

        let times: Vec<f64> = store.series(ch(1)).unwrap().points().iter().map(|p| p.time).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0]);
        assert_eq!(buffer.pending_scans(), 0);
        assert_eq!(buffer.drain_into(&mut store, 0.5), 0);
    }

    #[test]
    fn test_single_append_and_unknown_channel() {
        let buffer = HandoffBuffer::new(1);
        buffer.append(ch(0), 1.5);
        buffer.append(ch(3), 9.0);
        assert_eq!(buffer.take(), vec![vec![1.5]]);
    }

    #[test]
    fn test_reset_changes_channel_count() {
        let buffer = HandoffBuffer::new(1);
        buffer.append(ch(0), 1.0);
        buffer.reset(3);
        assert_eq!(buffer.take(), vec![Vec::<f64>::new(); 3]);
    }

    #[test]
    fn test_concurrent_batches_never_torn() {
        let buffer = Arc::new(HandoffBuffer::new(2));
        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for i in 0..1_000 {
                    let v = f64::from(i);
                    buffer.append_batch(&[vec![v, v], vec![-v, -v]]);
                }
            })
        };

        let mut store = TimeSeriesStore::new();
        while !producer.is_finished() {
            let taken = buffer.take();
            assert_eq!(taken[0].len(), taken[1].len());
            for (index, values) in taken.iter().enumerate() {
                store.append_values(ch(index), values, 1.0);
            }
        }
        producer.join().unwrap();
        buffer.drain_into(&mut store, 1.0);

        assert_eq!(store.series(ch(0)).unwrap().len(), 2_000);
        assert_eq!(store.series(ch(1)).unwrap().len(), 2_000);
    }
}
