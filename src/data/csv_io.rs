//! CSV persistence of a [`TimeSeriesStore`].
//!
//! One line per scan: the time followed by one value per channel in ascending
//! channel order, every number fixed-point with six decimals, `\n` terminated, no
//! header row. Loading is the inverse; lines with fewer than two fields are skipped
//! and times must increase strictly from one line to the next.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::data::series::{SeriesPoint, TimeSeriesStore};
use crate::data::ChannelId;
use crate::error::{AppResult, DaqError};

/// Write `store` as CSV. Returns the number of rows written.
///
/// Rows are limited to the shortest channel, and the final scan is not exported.
pub fn write_series<W: Write>(store: &TimeSeriesStore, writer: W) -> AppResult<usize> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    let columns: Vec<&[SeriesPoint]> = store.channels().map(|(_, s)| s.points()).collect();
    let scans = columns.iter().map(|c| c.len()).min().unwrap_or(0);
    let rows = scans.saturating_sub(1);

    let mut record: Vec<String> = Vec::with_capacity(columns.len() + 1);
    for row in 0..rows {
        record.clear();
        if let Some(first) = columns.first() {
            record.push(format!("{:.6}", first[row].time));
        }
        record.extend(columns.iter().map(|c| format!("{:.6}", c[row].value)));
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(rows)
}

/// Save `store` to `path`.
pub fn save_series<P: AsRef<Path>>(store: &TimeSeriesStore, path: P) -> AppResult<usize> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let rows = write_series(store, file)?;
    info!(path = %path.display(), rows, channels = store.num_channels(), "Saved series");
    Ok(rows)
}

/// Parse CSV written by [`write_series`].
pub fn read_series<R: Read>(reader: R) -> AppResult<TimeSeriesStore> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut store = TimeSeriesStore::new();
    let mut record = csv::StringRecord::new();
    let mut previous: Option<f64> = None;
    while csv.read_record(&mut record)? {
        let line = record.position().map_or(0, csv::Position::line);
        let fields: Vec<&str> = record.iter().filter(|f| !f.is_empty()).collect();
        if fields.len() < 2 {
            debug!(line, "Skipping short line");
            continue;
        }

        let time = parse_field(fields[0], line)?;
        if let Some(prev) = previous.filter(|&prev| time <= prev) {
            return Err(DaqError::Parse {
                line,
                message: format!("time {time} is not after {prev}"),
            });
        }
        previous = Some(time);
        for (index, field) in fields[1..].iter().enumerate() {
            let channel = ChannelId::new(index).ok_or_else(|| DaqError::Parse {
                line,
                message: format!("more than {} channels", crate::config::MAX_CHANNELS),
            })?;
            let value = parse_field(field, line)?;
            store.append(channel, &[SeriesPoint::new(time, value)]);
        }
    }
    Ok(store)
}

/// Load a series file.
pub fn load_series<P: AsRef<Path>>(path: P) -> AppResult<TimeSeriesStore> {
    let path = path.as_ref();
    let store = read_series(File::open(path)?)?;
    info!(
        path = %path.display(),
        channels = store.num_channels(),
        points = store.total_points(),
        "Loaded series"
    );
    Ok(store)
}

fn parse_field(field: &str, line: u64) -> AppResult<f64> {
    field.parse::<f64>().map_err(|e| DaqError::Parse {
        line,
        message: format!("'{field}': {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(index: usize) -> ChannelId {
        ChannelId::new(index).unwrap()
    }

    #[test]
    fn test_exact_layout_drops_last_scan() {
        let mut store = TimeSeriesStore::new();
        store.append_values(ch(0), &[1.0, 2.0, 3.0], 0.01);
        store.append_values(ch(1), &[-1.5, 0.25, 9.0], 0.01);

        let mut out = Vec::new();
        assert_eq!(write_series(&store, &mut out).unwrap(), 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "0.000000,1.000000,-1.500000\n0.010000,2.000000,0.250000\n"
        );
    }

    #[test]
    fn test_empty_store_writes_nothing() {
        let mut out = Vec::new();
        assert_eq!(write_series(&TimeSeriesStore::new(), &mut out).unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_read_skips_short_lines() {
        let text = "0.0,1.0,2.0\n\n5.0\n0.5,,\n1.0,3.0,4.0\n";
        let store = read_series(text.as_bytes()).unwrap();
        assert_eq!(store.num_channels(), 2);
        let ch1: Vec<f64> = store.series(ch(1)).unwrap().points().iter().map(|p| p.value).collect();
        assert_eq!(ch1, vec![2.0, 4.0]);
    }

    #[test]
    fn test_unparseable_number_reports_line() {
        let err = read_series("0.0,1.0\n0.1,abc\n".as_bytes()).unwrap_err();
        match err {
            DaqError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_non_increasing_time_is_rejected() {
        for text in ["1.000000,1.0\n0.500000,2.0\n", "0.0,1.0\n0.0,2.0\n"] {
            match read_series(text.as_bytes()).unwrap_err() {
                DaqError::Parse { line, message } => {
                    assert_eq!(line, 2);
                    assert!(message.contains("not after"), "{message}");
                }
                other => panic!("unexpected error {other}"),
            }
        }
    }
}
