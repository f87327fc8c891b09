//! Saving a recorded session and reading it back.

use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use daq_recorder::config::{RecorderConfig, WaveformKind};
use daq_recorder::data::{load_series, ChannelId};
use daq_recorder::hardware::MockBackend;
use daq_recorder::session::{Discard, RecorderSession};
use daq_recorder::DaqError;

const TIMEOUT: Duration = Duration::from_secs(10);

fn recorded_session(num_channels: usize) -> RecorderSession {
    let mut config = RecorderConfig::default();
    config.acquisition.num_channels = num_channels;
    let backend = MockBackend::builder()
        .max_scan_rate(1_000.0)
        .realtime(false)
        .waveform(WaveformKind::Sine)
        .frequency(2.0)
        .noise(0.01)
        .scan_budget(500)
        .build();
    let mut session = RecorderSession::new(config, Box::new(backend));

    session.start_recording().unwrap();
    let target = 50 * num_channels;
    let deadline = Instant::now() + TIMEOUT;
    while session.store().total_points() + num_channels * session.pending_scans() < target
        && Instant::now() < deadline
    {
        session.poll_events();
        thread::sleep(Duration::from_millis(2));
    }
    session.stop_recording().unwrap();
    session.wait_until_idle(TIMEOUT).unwrap();
    session
}

#[test]
fn test_saved_file_reloads_within_print_precision() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.csv");
    let mut session = recorded_session(3);

    assert_eq!(session.save(&path).unwrap(), 49);
    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 49);
    assert!(text.starts_with("0.000000,"));
    assert!(text.lines().all(|line| line.split(',').count() == 4));

    let loaded = load_series(&path).unwrap();
    assert_eq!(loaded.num_channels(), 3);
    for index in 0..3 {
        let channel = ChannelId::new(index).unwrap();
        let original = session.store().series(channel).unwrap().points();
        let reloaded = loaded.series(channel).unwrap().points();
        assert_eq!(reloaded.len(), 49);
        for (a, b) in original.iter().zip(reloaded) {
            assert!((a.time - b.time).abs() <= 5e-7);
            assert!((a.value - b.value).abs() <= 5e-7);
        }
    }
}

#[test]
fn test_open_requires_discard_for_unsaved_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.csv");

    let mut first = recorded_session(2);
    first.save(&path).unwrap();

    let mut second = recorded_session(2);
    let err = second.open(&path, Discard::No).unwrap_err();
    assert!(matches!(err, DaqError::UnsavedData(_)));

    second.open(&path, Discard::Yes).unwrap();
    assert!(!second.has_unsaved_data());
    assert_eq!(second.store().total_points(), 2 * 49);
    assert_eq!(second.zoom().current_index(), 1);
}

#[test]
fn test_malformed_file_reports_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.csv");
    fs::write(&path, "0.000000,1.000000\n0.010000,abc\n").unwrap();

    match load_series(&path) {
        Err(DaqError::Parse { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected parse error, got {other:?}"),
    }
}
