//! Zoom windows and the zoom history.

use tracing::debug;

/// Fewest ticks an adjusted axis may have.
pub const MIN_TICKS: u32 = 4;

/// Minimum rubber band size, pixels.
pub const MIN_SELECTION: f64 = 4.0;

/// Tolerance for deciding whether a bound sits exactly on a tick.
const SNAP_EPSILON: f64 = 1e-9;

/// Snap `[min, max]` outward to "nice" tick boundaries.
///
/// The tick step is the smallest of `{1, 2, 5} x 10^n` that is not below a quarter of
/// the span. Returns the snapped bounds and the tick count (at least [`MIN_TICKS`]).
pub fn adjust_axis(min: f64, max: f64) -> (f64, f64, u32) {
    let (min, max) = if max > min && (max - min).is_finite() {
        (min, max)
    } else {
        // Degenerate selection: widen around the point.
        (min - 0.5, min + 0.5)
    };

    let gross_step = (max - min) / f64::from(MIN_TICKS);
    let mut step = 10f64.powi(gross_step.log10().floor() as i32);
    if 5.0 * step < gross_step {
        step *= 5.0;
    } else if 2.0 * step < gross_step {
        step *= 2.0;
    }

    let lo = (min / step + SNAP_EPSILON).floor();
    let hi = (max / step - SNAP_EPSILON).ceil();
    let ticks = (hi - lo).max(f64::from(MIN_TICKS)) as u32;
    (lo * step, hi * step, ticks)
}

/// A rectangular (time x value) viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomWindow {
    /// Left edge, seconds
    pub min_x: f64,
    /// Right edge, seconds
    pub max_x: f64,
    /// Bottom edge, volts
    pub min_y: f64,
    /// Top edge, volts
    pub max_y: f64,
    /// Horizontal tick intervals
    pub num_x_ticks: u32,
    /// Vertical tick intervals
    pub num_y_ticks: u32,
    /// Keep the right edge on the newest sample
    pub includes_right_edge: bool,
}

impl Default for ZoomWindow {
    fn default() -> Self {
        Self {
            min_x: 0.0,
            max_x: 2.0,
            min_y: -2.0,
            max_y: 2.0,
            num_x_ticks: 5,
            num_y_ticks: 5,
            includes_right_edge: false,
        }
    }
}

impl ZoomWindow {
    /// Default window with the given vertical range.
    pub fn with_y_range(min_y: f64, max_y: f64) -> Self {
        Self {
            min_y,
            max_y,
            ..Self::default()
        }
    }

    /// Width in seconds.
    pub fn span_x(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height in volts.
    pub fn span_y(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Snap both axes to nice tick boundaries.
    pub fn adjust(&mut self) {
        (self.min_x, self.max_x, self.num_x_ticks) = adjust_axis(self.min_x, self.max_x);
        (self.min_y, self.max_y, self.num_y_ticks) = adjust_axis(self.min_y, self.max_y);
    }

    /// Pan by whole tick steps.
    pub fn scroll(&mut self, dx_ticks: f64, dy_ticks: f64) {
        let step_x = self.span_x() / f64::from(self.num_x_ticks.max(1));
        self.min_x += dx_ticks * step_x;
        self.max_x += dx_ticks * step_x;

        let step_y = self.span_y() / f64::from(self.num_y_ticks.max(1));
        self.min_y += dy_ticks * step_y;
        self.max_y += dy_ticks * step_y;
    }

    /// Shift horizontally so the right edge lands on `max_x`.
    pub fn align_right(&mut self, max_x: f64) {
        // Exact assignment: growth checks compare the edge against the newest sample.
        let span = self.span_x();
        self.max_x = max_x;
        self.min_x = max_x - span;
    }

    /// Is `t` inside the horizontal range?
    pub fn contains_x(&self, t: f64) -> bool {
        self.min_x <= t && t <= self.max_x
    }
}

/// A selection rectangle in widget pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    /// Left edge
    pub left: f64,
    /// Top edge
    pub top: f64,
    /// Right edge (exclusive)
    pub right: f64,
    /// Bottom edge (exclusive)
    pub bottom: f64,
}

impl PixelRect {
    /// Rectangle spanning two corner points in any order.
    pub fn from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        Self {
            left: a.0.min(b.0),
            top: a.1.min(b.1),
            right: a.0.max(b.0),
            bottom: a.1.max(b.1),
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Height in pixels.
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Widget geometry: the plot occupies the widget minus a margin on every side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    /// Widget width, pixels
    pub width: f64,
    /// Widget height, pixels
    pub height: f64,
    /// Margin around the plot, pixels
    pub margin: f64,
}

impl PlotArea {
    /// Margin used by the interactive viewer.
    pub const DEFAULT_MARGIN: f64 = 50.0;

    /// Widget of the given size with the default margin.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            margin: Self::DEFAULT_MARGIN,
        }
    }

    /// Left pixel of the plot.
    pub fn left(&self) -> f64 {
        self.margin
    }

    /// Top pixel of the plot.
    pub fn top(&self) -> f64 {
        self.margin
    }

    /// Plot width, pixels.
    pub fn plot_width(&self) -> f64 {
        self.width - 2.0 * self.margin
    }

    /// Plot height, pixels.
    pub fn plot_height(&self) -> f64 {
        self.height - 2.0 * self.margin
    }

    /// Last pixel row of the plot.
    pub fn bottom(&self) -> f64 {
        self.top() + self.plot_height() - 1.0
    }

    /// Last pixel column of the plot.
    pub fn right(&self) -> f64 {
        self.left() + self.plot_width() - 1.0
    }

    /// True when the plot has room to draw.
    pub fn is_valid(&self) -> bool {
        self.plot_width() >= 2.0 && self.plot_height() >= 2.0
    }

    /// Map a selection to data coordinates of `window`. Pixel Y grows downward.
    pub fn selection_to_window(&self, rect: &PixelRect, window: &ZoomWindow) -> ZoomWindow {
        let dx = window.span_x() / self.plot_width();
        let dy = window.span_y() / self.plot_height();
        ZoomWindow {
            min_x: window.min_x + dx * (rect.left - self.margin),
            max_x: window.min_x + dx * (rect.right - self.margin),
            min_y: window.max_y - dy * (rect.bottom - self.margin),
            max_y: window.max_y - dy * (rect.top - self.margin),
            ..ZoomWindow::default()
        }
    }
}

/// History of zoom windows.
///
/// Window 0 always fits all data; it widens as data arrives and never narrows until
/// [`clear`](Self::clear). The current window may track the live right edge.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomStack {
    windows: Vec<ZoomWindow>,
    current: usize,
    y_range: (f64, f64),
}

impl ZoomStack {
    /// Fresh history: the fit window plus a working copy, starting zoomed in.
    pub fn new(min_y: f64, max_y: f64) -> Self {
        let window = ZoomWindow::with_y_range(min_y, max_y);
        Self {
            windows: vec![window, window],
            current: 1,
            y_range: (min_y, max_y),
        }
    }

    /// The window being displayed.
    pub fn current(&self) -> &ZoomWindow {
        &self.windows[self.current]
    }

    /// Index of the displayed window.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The fit-all window.
    pub fn fit_window(&self) -> &ZoomWindow {
        &self.windows[0]
    }

    /// All windows, outermost first.
    pub fn windows(&self) -> &[ZoomWindow] {
        &self.windows
    }

    /// Vertical range used for fit windows.
    pub fn y_range(&self) -> (f64, f64) {
        self.y_range
    }

    /// Change the vertical range used by the next fit.
    pub fn set_y_range(&mut self, min_y: f64, max_y: f64) {
        self.y_range = (min_y, max_y);
    }

    /// Drop all history.
    pub fn clear(&mut self) {
        *self = Self::new(self.y_range.0, self.y_range.1);
    }

    /// Widen window 0 to reach `last_time`; it never shrinks.
    pub fn reset_to_fit(&mut self, last_time: Option<f64>) {
        let (min_y, max_y) = self.y_range;
        let fit = &mut self.windows[0];
        fit.min_x = 0.0;
        if let Some(last) = last_time {
            if fit.max_x < last {
                fit.max_x = last;
            }
        }
        fit.min_y = min_y;
        fit.max_y = max_y;
    }

    /// Zoom to a selection made on a widget of geometry `area`.
    ///
    /// Selections under four pixels in either direction are ignored (returns false).
    /// Deeper history is discarded and the new window becomes current.
    pub fn push_zoom(&mut self, rect: PixelRect, area: &PlotArea, last_time: Option<f64>) -> bool {
        if rect.width() < MIN_SELECTION || rect.height() < MIN_SELECTION || !area.is_valid() {
            return false;
        }
        let previous = *self.current();
        let mut window = area.selection_to_window(&rect, &previous);
        window.adjust();
        self.push_window(window, &previous, last_time);
        true
    }

    /// Push an explicit window after the current one and make it current.
    ///
    /// The new window tracks the right edge when the window it was taken from did and
    /// it still contains the newest sample.
    pub fn push_window(&mut self, mut window: ZoomWindow, previous: &ZoomWindow, last_time: Option<f64>) {
        window.includes_right_edge = match last_time {
            Some(last) => {
                let was_tracking = previous.includes_right_edge
                    || (previous.max_x - last).abs() <= SNAP_EPSILON * last.abs().max(1.0);
                was_tracking && window.contains_x(last)
            }
            None => false,
        };
        self.windows.truncate(self.current + 1);
        self.windows.push(window);
        debug!(
            depth = self.windows.len(),
            min_x = window.min_x,
            max_x = window.max_x,
            tracking = window.includes_right_edge,
            "Zoom pushed"
        );
        self.zoom_in(last_time);
    }

    /// Can the view move deeper into the history?
    pub fn can_zoom_in(&self) -> bool {
        self.current + 1 < self.windows.len()
    }

    /// Can the view move out toward the fit window?
    pub fn can_zoom_out(&self) -> bool {
        self.current > 0
    }

    /// Move one window deeper.
    pub fn zoom_in(&mut self, last_time: Option<f64>) -> bool {
        if !self.can_zoom_in() {
            return false;
        }
        self.current += 1;
        self.follow_right_edge(last_time);
        true
    }

    /// Move one window outward.
    pub fn zoom_out(&mut self, last_time: Option<f64>) -> bool {
        if !self.can_zoom_out() {
            return false;
        }
        self.current -= 1;
        self.follow_right_edge(last_time);
        true
    }

    /// Pan the current window by whole ticks. Horizontal panning stops right-edge tracking.
    pub fn scroll(&mut self, dx_ticks: f64, dy_ticks: f64) {
        let window = &mut self.windows[self.current];
        window.scroll(dx_ticks, dy_ticks);
        if dx_ticks != 0.0 {
            window.includes_right_edge = false;
        }
    }

    /// React to new data moving the newest sample from `old_last` to `new_last`.
    ///
    /// Window 0 widens. The current window scrolls right, and starts tracking, when the
    /// previous newest sample was visible and the new one is past its right edge;
    /// otherwise it stops tracking.
    pub fn on_data_growth(&mut self, old_last: Option<f64>, new_last: Option<f64>) {
        self.reset_to_fit(new_last);

        let window = &mut self.windows[self.current];
        let old_max = old_last.unwrap_or(window.max_x);
        let new_max = new_last.unwrap_or(window.max_x);
        if window.contains_x(old_max) && new_max > window.max_x {
            window.align_right(new_max);
            window.includes_right_edge = true;
        } else {
            window.includes_right_edge = false;
        }
    }

    fn follow_right_edge(&mut self, last_time: Option<f64>) {
        let window = &mut self.windows[self.current];
        if window.includes_right_edge {
            window.align_right(last_time.unwrap_or(window.max_x));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_adjust_axis_examples() {
        assert_eq!(adjust_axis(1.25, 3.75), (1.0, 4.0, 6));
        let (min, max, ticks) = adjust_axis(0.0, 0.95);
        assert_close(min, 0.0);
        assert_close(max, 1.0);
        assert_eq!(ticks, 5);
    }

    #[test]
    fn test_adjust_axis_contains_and_ticks() {
        let cases = [(0.0, 1.0), (-3.7, 12.2), (0.0131, 0.0171), (-1000.0, -20.0), (5.0, 5.5)];
        for (lo, hi) in cases {
            let (min, max, ticks) = adjust_axis(lo, hi);
            let tolerance = 1e-9 * (hi - lo);
            assert!(min <= lo + tolerance, "[{lo}, {hi}] -> [{min}, {max}]");
            assert!(max >= hi - tolerance, "[{lo}, {hi}] -> [{min}, {max}]");
            assert!(ticks >= MIN_TICKS);
        }
    }

    #[test]
    fn test_adjust_axis_idempotent() {
        for (lo, hi) in [(1.25, 3.75), (-10.0, 10.0), (0.3, 0.7), (2.0, 19.0)] {
            let once = adjust_axis(lo, hi);
            let twice = adjust_axis(once.0, once.1);
            assert_close(once.0, twice.0);
            assert_close(once.1, twice.1);
            assert_eq!(once.2, twice.2);
        }
    }

    #[test]
    fn test_adjust_axis_degenerate() {
        let (min, max, ticks) = adjust_axis(3.0, 3.0);
        assert!(max > min);
        assert!(ticks >= MIN_TICKS);
    }

    #[test]
    fn test_selection_mapping() {
        let area = PlotArea::new(500.0, 500.0);
        let window = ZoomWindow {
            min_x: 0.0,
            max_x: 10.0,
            min_y: -10.0,
            max_y: 10.0,
            ..ZoomWindow::default()
        };
        let rect = PixelRect {
            left: 100.0,
            top: 50.0,
            right: 200.0,
            bottom: 450.0,
        };
        let mapped = area.selection_to_window(&rect, &window);
        assert_close(mapped.min_x, 1.25);
        assert_close(mapped.max_x, 3.75);
        assert_close(mapped.min_y, -10.0);
        assert_close(mapped.max_y, 10.0);
    }

    #[test]
    fn test_push_truncates_history_and_ignores_small_selections() {
        let area = PlotArea::new(500.0, 500.0);
        let mut stack = ZoomStack::new(-10.0, 10.0);
        let small = PixelRect::from_corners((100.0, 100.0), (102.0, 300.0));
        assert!(!stack.push_zoom(small, &area, None));
        assert_eq!(stack.windows().len(), 2);

        let rect = PixelRect::from_corners((100.0, 100.0), (300.0, 300.0));
        assert!(stack.push_zoom(rect, &area, None));
        assert!(stack.push_zoom(rect, &area, None));
        assert_eq!(stack.windows().len(), 4);
        assert_eq!(stack.current_index(), 3);

        assert!(stack.zoom_out(None));
        assert!(stack.zoom_out(None));
        assert!(stack.can_zoom_in());
        assert!(stack.push_zoom(rect, &area, None));
        assert_eq!(stack.windows().len(), 3);
        assert!(!stack.can_zoom_in());
    }

    #[test]
    fn test_fit_window_never_shrinks() {
        let mut stack = ZoomStack::new(-10.0, 10.0);
        stack.reset_to_fit(Some(30.0));
        stack.reset_to_fit(Some(5.0));
        assert_eq!(stack.fit_window().max_x, 30.0);
        stack.clear();
        assert_eq!(stack.fit_window().max_x, 2.0);
        assert_eq!(stack.current_index(), 1);
    }

    #[test]
    fn test_growth_scrolls_visible_edge() {
        let mut stack = ZoomStack::new(-10.0, 10.0);
        stack.on_data_growth(None, Some(1.0));
        assert_eq!(stack.current().max_x, 2.0);
        assert!(!stack.current().includes_right_edge);

        stack.on_data_growth(Some(1.0), Some(2.5));
        assert_close(stack.current().min_x, 0.5);
        assert_close(stack.current().max_x, 2.5);
        assert!(stack.current().includes_right_edge);
        assert_eq!(stack.fit_window().max_x, 2.5);
    }

    #[test]
    fn test_pan_stops_tracking() {
        let mut stack = ZoomStack::new(-10.0, 10.0);
        stack.on_data_growth(Some(2.0), Some(3.0));
        assert!(stack.current().includes_right_edge);
        stack.scroll(-1.0, 0.0);
        assert!(!stack.current().includes_right_edge);
        stack.on_data_growth(Some(3.0), Some(4.0));
        assert!(!stack.current().includes_right_edge);
        assert_close(stack.current().max_x, 2.6);
    }

    #[test]
    fn test_zoom_in_reapplies_tracking() {
        let mut stack = ZoomStack::new(-10.0, 10.0);
        stack.on_data_growth(Some(2.0), Some(3.0));
        stack.zoom_out(Some(3.0));
        stack.on_data_growth(Some(3.0), Some(8.0));
        stack.zoom_in(Some(8.0));
        assert_close(stack.current().max_x, 8.0);
        assert_close(stack.current().min_x, 6.0);
    }
}
