//! Append-only per-channel time series.

use std::collections::BTreeMap;

use crate::data::ChannelId;

/// One decimated sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    /// Seconds since the start of the recording
    pub time: f64,
    /// Volts
    pub value: f64,
}

impl SeriesPoint {
    /// New point.
    pub fn new(time: f64, value: f64) -> Self {
        Self { time, value }
    }
}

/// Points of one channel, strictly increasing in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    points: Vec<SeriesPoint>,
}

impl TimeSeries {
    /// All points in time order.
    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when no point has been stored.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Time of the newest point.
    pub fn last_time(&self) -> Option<f64> {
        self.points.last().map(|p| p.time)
    }

    /// Index of the first point with `time >= t` (binary search).
    pub fn lower_bound(&self, t: f64) -> usize {
        self.points.partition_point(|p| p.time < t)
    }

    /// Smallest and largest value, if any.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.points.iter().fold(None, |acc, p| match acc {
            None => Some((p.value, p.value)),
            Some((lo, hi)) => Some((lo.min(p.value), hi.max(p.value))),
        })
    }

    fn push_all(&mut self, points: &[SeriesPoint]) {
        debug_assert!(
            match (self.points.last(), points.first()) {
                (Some(last), Some(first)) => first.time > last.time,
                _ => true,
            },
            "series points must be appended in time order"
        );
        self.points.reserve(points.len());
        self.points.extend_from_slice(points);
    }
}

/// The permanent record: one [`TimeSeries`] per channel.
///
/// Points are only ever appended; existing points are never modified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeriesStore {
    series: BTreeMap<ChannelId, TimeSeries>,
}

impl TimeSeriesStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `points` to `channel`; returns the channel's new last time.
    pub fn append(&mut self, channel: ChannelId, points: &[SeriesPoint]) -> Option<f64> {
        let series = self.series.entry(channel).or_default();
        series.push_all(points);
        series.last_time()
    }

    /// Append evenly spaced values, continuing one `dt` after the channel's last point
    /// (or at time 0 for an empty channel). Returns the new last time.
    pub fn append_values(&mut self, channel: ChannelId, values: &[f64], dt: f64) -> Option<f64> {
        let series = self.series.entry(channel).or_default();
        let start = series.last_time().map_or(0.0, |t| t + dt);
        series.points.reserve(values.len());
        series.points.extend(
            values
                .iter()
                .enumerate()
                .map(|(i, &value)| SeriesPoint::new(start + i as f64 * dt, value)),
        );
        series.last_time()
    }

    /// Series of one channel.
    pub fn series(&self, channel: ChannelId) -> Option<&TimeSeries> {
        self.series.get(&channel)
    }

    /// Channels with a series, in ascending order.
    pub fn channels(&self) -> impl Iterator<Item = (ChannelId, &TimeSeries)> {
        self.series.iter().map(|(id, series)| (*id, series))
    }

    /// Number of channels holding a series.
    pub fn num_channels(&self) -> usize {
        self.series.len()
    }

    /// Time of the newest point on `channel`; `None` when empty.
    pub fn last_time(&self, channel: ChannelId) -> Option<f64> {
        self.series.get(&channel).and_then(TimeSeries::last_time)
    }

    /// Time of the newest point on the lowest channel holding data.
    pub fn latest_time(&self) -> Option<f64> {
        self.series.values().find_map(TimeSeries::last_time)
    }

    /// Points across all channels.
    pub fn total_points(&self) -> usize {
        self.series.values().map(TimeSeries::len).sum()
    }

    /// True when no channel holds a point.
    pub fn is_empty(&self) -> bool {
        self.series.values().all(TimeSeries::is_empty)
    }

    /// Drop everything (new document).
    pub fn clear(&mut self) {
        self.series.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(index: usize) -> ChannelId {
        ChannelId::new(index).unwrap()
    }

    #[test]
    fn test_empty_store() {
        let store = TimeSeriesStore::new();
        assert!(store.is_empty());
        assert_eq!(store.last_time(ch(0)), None);
        assert_eq!(store.latest_time(), None);
    }

    #[test]
    fn test_append_values_continues_after_last() {
        let mut store = TimeSeriesStore::new();
        assert_eq!(store.append_values(ch(0), &[1.0, 2.0, 3.0], 0.25), Some(0.5));
        assert_eq!(store.append_values(ch(0), &[4.0], 0.25), Some(0.75));
        let series = store.series(ch(0)).unwrap();
        assert_eq!(series.len(), 4);
        for (i, point) in series.points().iter().enumerate() {
            assert!((point.time - i as f64 * 0.25).abs() < 1e-12);
        }
        assert_eq!(series.value_range(), Some((1.0, 4.0)));
    }

    #[test]
    fn test_lower_bound() {
        let mut store = TimeSeriesStore::new();
        store.append_values(ch(0), &[0.0; 10], 1.0);
        let series = store.series(ch(0)).unwrap();
        assert_eq!(series.lower_bound(-1.0), 0);
        assert_eq!(series.lower_bound(3.0), 3);
        assert_eq!(series.lower_bound(3.5), 4);
        assert_eq!(series.lower_bound(100.0), 10);
    }

    #[test]
    fn test_channels_ascending_and_clear() {
        let mut store = TimeSeriesStore::new();
        store.append(ch(2), &[SeriesPoint::new(0.0, 1.0)]);
        store.append(ch(0), &[SeriesPoint::new(0.0, 2.0), SeriesPoint::new(1.0, 3.0)]);
        let ids: Vec<usize> = store.channels().map(|(id, _)| id.index()).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(store.latest_time(), Some(1.0));
        assert_eq!(store.total_points(), 3);
        store.clear();
        assert!(store.is_empty());
    }
}
