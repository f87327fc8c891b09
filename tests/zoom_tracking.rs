//! Live right-edge tracking while data grows, driven through `RecorderSession`.

use std::thread;
use std::time::{Duration, Instant};

use daq_recorder::config::RecorderConfig;
use daq_recorder::hardware::MockBackend;
use daq_recorder::session::RecorderSession;
use daq_recorder::view::{PixelRect, PlotArea};

const TIMEOUT: Duration = Duration::from_secs(10);

/// 300 points per recording at dt = 0.01 s.
fn session() -> RecorderSession {
    let backend = MockBackend::builder()
        .max_scan_rate(1_000.0)
        .realtime(false)
        .scan_budget(3_000)
        .build();
    RecorderSession::new(RecorderConfig::default(), Box::new(backend))
}

fn record_batch(session: &mut RecorderSession) {
    let target = session.store().total_points() + 600;
    session.start_recording().unwrap();
    let deadline = Instant::now() + TIMEOUT;
    while session.store().total_points() + 2 * session.pending_scans() < target
        && Instant::now() < deadline
    {
        session.poll_events();
        thread::sleep(Duration::from_millis(2));
    }
    session.stop_recording().unwrap();
    session.wait_until_idle(TIMEOUT).unwrap();
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-6, "{a} != {b}");
}

#[test]
fn test_view_follows_growing_data() {
    let mut session = session();
    record_batch(&mut session);

    let last = session.store().latest_time().unwrap();
    assert_close(last, 2.99);
    let current = session.zoom().current();
    assert!(current.includes_right_edge);
    assert_close(current.max_x, last);
    assert_close(current.span_x(), 2.0);
    assert_close(session.zoom().fit_window().max_x, last);
}

#[test]
fn test_panned_view_stays_put() {
    let mut session = session();
    record_batch(&mut session);

    // Five ticks of 0.4 s move the newest sample out of view.
    session.scroll(-5.0, 0.0);
    let panned = *session.zoom().current();
    assert!(!panned.includes_right_edge);
    assert!(!panned.contains_x(2.99));

    record_batch(&mut session);
    assert_close(session.store().latest_time().unwrap(), 5.99);
    let current = session.zoom().current();
    assert_close(current.min_x, panned.min_x);
    assert_close(current.max_x, panned.max_x);
    assert_close(session.zoom().fit_window().max_x, 5.99);
}

#[test]
fn test_zoom_history_reapplies_tracking() {
    let mut session = session();
    record_batch(&mut session);
    assert!(session.zoom_out());
    assert_eq!(session.zoom().current_index(), 0);

    record_batch(&mut session);
    assert!(session.zoom_in());
    let current = session.zoom().current();
    assert_close(current.max_x, 5.99);
    assert_close(current.span_x(), 2.0);
}

#[test]
fn test_rubber_band_near_right_edge_keeps_tracking() {
    let mut session = session();
    record_batch(&mut session);

    // Right half of the plot, full height.
    let area = PlotArea::new(500.0, 500.0);
    let rect = PixelRect::from_corners((250.0, 50.0), (450.0, 450.0));
    assert!(session.zoom_to(rect, &area));
    assert_eq!(session.zoom().current_index(), 2);
    assert!(session.zoom().current().includes_right_edge);

    let tiny = PixelRect::from_corners((250.0, 50.0), (252.0, 450.0));
    assert!(!session.zoom_to(tiny, &area));
    assert_eq!(session.zoom().current_index(), 2);
}
