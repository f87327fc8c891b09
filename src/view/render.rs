//! Per-pixel min/max decimation of time series into drawable polylines.
//!
//! A recording holds far more points than the display has pixel columns. For each
//! channel the renderer binary-searches the visible range, maps points to pixel
//! columns and keeps only the lowest and highest row reached in every column, so the
//! output never exceeds two vertices per column while every spike stays visible.
//!
//! The nearest point on each side of the window is emitted once at its real,
//! off-plot position so the trace enters and leaves the view with its true slope.
//! Those two vertices never join a column, which bounds the output at
//! `2 * plot_width + 2` vertices per channel.

use crate::config::{DisplaySettings, Rgb};
use crate::data::{ChannelId, SeriesPoint, TimeSeries, TimeSeriesStore};
use crate::view::zoom::{PlotArea, ZoomWindow};

/// A vertex in widget pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotPoint {
    /// Horizontal pixel
    pub x: f64,
    /// Vertical pixel (grows downward)
    pub y: f64,
}

/// Drawable trace of one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    /// Source channel
    pub channel: ChannelId,
    /// Trace color
    pub color: Rgb,
    /// Connected vertices, left to right
    pub points: Vec<PlotPoint>,
}

/// Column being accumulated.
#[derive(Debug, Clone, Copy)]
struct Column {
    x: f64,
    top: f64,
    bottom: f64,
}

/// Turns a window of a [`TimeSeriesStore`] into polylines for a [`PlotArea`].
#[derive(Debug, Clone, Copy)]
pub struct DecimatingRenderer<'a> {
    window: &'a ZoomWindow,
    area: &'a PlotArea,
}

impl<'a> DecimatingRenderer<'a> {
    /// Renderer for `window` drawn into `area`.
    pub fn new(window: &'a ZoomWindow, area: &'a PlotArea) -> Self {
        Self { window, area }
    }

    /// One polyline per channel. Channel `i` is shifted down by `i * trace_offset` volts.
    pub fn render(
        &self,
        store: &TimeSeriesStore,
        trace_offset: f64,
        display: &DisplaySettings,
    ) -> Vec<Polyline> {
        store
            .channels()
            .enumerate()
            .map(|(stack_index, (channel, series))| {
                let mut points = Vec::new();
                self.render_series(series, stack_index as f64 * trace_offset, &mut points);
                Polyline {
                    channel,
                    color: display.color(channel.index()),
                    points,
                }
            })
            .collect()
    }

    /// Decimate one series into `out` (cleared first), subtracting `offset` volts.
    pub fn render_series(&self, series: &TimeSeries, offset: f64, out: &mut Vec<PlotPoint>) {
        out.clear();
        if !self.area.is_valid() || series.is_empty() {
            return;
        }
        let visible = self.visible_points(series);

        let plot_width = self.area.plot_width();
        let first_column = self.area.left().floor();
        let last_column = (self.area.left() + plot_width - 1.0).floor();
        out.reserve((2 * visible.len()).min(2 * plot_width as usize) + 2);

        let x_scale = (plot_width - 1.0) / self.window.span_x();
        let y_scale = (self.area.plot_height() - 1.0) / self.window.span_y();
        let bottom = self.area.bottom();

        let mut column: Option<Column> = None;
        for point in visible {
            let x = self.area.left() + (point.time - self.window.min_x) * x_scale;
            let y = bottom - (point.value - offset - self.window.min_y) * y_scale;

            if point.time < self.window.min_x || point.time > self.window.max_x {
                if let Some(done) = column.take() {
                    emit(out, done);
                }
                out.push(PlotPoint { x, y });
                continue;
            }
            let col = x.floor().clamp(first_column, last_column);

            if let Some(current) = column.as_mut().filter(|c| c.x == col) {
                current.top = current.top.min(y);
                current.bottom = current.bottom.max(y);
                continue;
            }
            let next = Column {
                x: col,
                top: y,
                bottom: y,
            };
            if let Some(done) = column.replace(next) {
                emit(out, done);
            }
        }
        if let Some(done) = column {
            emit(out, done);
        }
    }

    /// Points from one before the window's left edge through the first past its right.
    fn visible_points<'s>(&self, series: &'s TimeSeries) -> &'s [SeriesPoint] {
        let points = series.points();
        let start = series.lower_bound(self.window.min_x).saturating_sub(1);
        let past_right = points[start..].partition_point(|p| p.time <= self.window.max_x);
        let end = (start + past_right + 1).min(points.len());
        &points[start..end]
    }
}

fn emit(out: &mut Vec<PlotPoint>, column: Column) {
    out.push(PlotPoint {
        x: column.x,
        y: column.top,
    });
    out.push(PlotPoint {
        x: column.x,
        y: column.bottom,
    });
}
