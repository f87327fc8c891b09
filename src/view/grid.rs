//! Tick lines and labels for the current window.

use crate::view::zoom::{PlotArea, ZoomWindow};

/// One tick line.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLine {
    /// Pixel column (vertical lines) or row (horizontal lines)
    pub position: f64,
    /// Data value at the line
    pub value: f64,
    /// Formatted value
    pub label: String,
}

/// Vertical (time) and horizontal (voltage) tick lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridLines {
    /// Lines at time ticks, left to right
    pub vertical: Vec<GridLine>,
    /// Lines at voltage ticks, bottom to top
    pub horizontal: Vec<GridLine>,
}

impl GridLines {
    /// Tick lines for `window` drawn into `area`. Empty when the area is too small.
    pub fn compute(window: &ZoomWindow, area: &PlotArea) -> Self {
        if !area.is_valid() {
            return Self::default();
        }
        let width = area.plot_width() as i64;
        let height = area.plot_height() as i64;
        let left = area.left();
        let bottom = area.bottom();

        let x_ticks = i64::from(window.num_x_ticks.max(1));
        let vertical = (0..=x_ticks)
            .map(|i| {
                let offset = (i * (width - 1) / x_ticks) as f64;
                let value = tick_value(window.min_x, window.span_x(), i, x_ticks);
                GridLine {
                    position: left + offset,
                    value,
                    label: format_label(value),
                }
            })
            .collect();

        let y_ticks = i64::from(window.num_y_ticks.max(1));
        let horizontal = (0..=y_ticks)
            .map(|j| {
                let offset = (j * (height - 1) / y_ticks) as f64;
                let value = tick_value(window.min_y, window.span_y(), j, y_ticks);
                GridLine {
                    position: bottom - offset,
                    value,
                    label: format_label(value),
                }
            })
            .collect();

        Self {
            vertical,
            horizontal,
        }
    }
}

fn tick_value(min: f64, span: f64, i: i64, ticks: i64) -> f64 {
    let value = min + i as f64 * span / ticks as f64;
    // Rounding noise near zero would otherwise print as 5.55112e-17.
    if value.abs() < span.abs() * 1e-9 {
        0.0
    } else {
        value
    }
}

/// Format with up to six significant digits, trailing zeros trimmed; scientific
/// notation below `1e-4` and from `1e6` up.
pub fn format_label(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return if value.is_finite() { "0".to_string() } else { value.to_string() };
    }
    let exponent = value.abs().log10().floor() as i32;
    if !(-4..6).contains(&exponent) {
        let text = format!("{value:.5e}");
        let (mantissa, exp) = text.split_once('e').unwrap_or((text.as_str(), "0"));
        let exp: i32 = exp.parse().unwrap_or(0);
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{sign}{:02}", trim_zeros(mantissa), exp.abs());
    }
    let decimals = (5 - exponent).max(0) as usize;
    trim_zeros(&format!("{value:.decimals$}")).to_string()
}

fn trim_zeros(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(format_label(0.0), "0");
        assert_eq!(format_label(2.5), "2.5");
        assert_eq!(format_label(-10.0), "-10");
        assert_eq!(format_label(0.1 + 0.2), "0.3");
        assert_eq!(format_label(123456.0), "123456");
        assert_eq!(format_label(1234567.0), "1.23457e+06");
        assert_eq!(format_label(0.00001234), "1.234e-05");
    }

    #[test]
    fn test_default_window_grid() {
        let window = ZoomWindow::default();
        let area = PlotArea::new(500.0, 300.0);
        let grid = GridLines::compute(&window, &area);

        assert_eq!(grid.vertical.len(), 6);
        assert_eq!(grid.vertical[0].position, 50.0);
        assert_eq!(grid.vertical[5].position, 50.0 + 399.0);
        let labels: Vec<&str> = grid.vertical.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, vec!["0", "0.4", "0.8", "1.2", "1.6", "2"]);

        assert_eq!(grid.horizontal.len(), 6);
        assert_eq!(grid.horizontal[0].position, area.bottom());
        assert_eq!(grid.horizontal[0].label, "-2");
        assert_eq!(grid.horizontal[5].label, "2");
    }

    #[test]
    fn test_near_zero_tick_snaps() {
        let window = ZoomWindow {
            min_y: -0.3,
            max_y: 0.3,
            num_y_ticks: 6,
            ..ZoomWindow::default()
        };
        let grid = GridLines::compute(&window, &PlotArea::new(400.0, 400.0));
        assert_eq!(grid.horizontal[3].label, "0");
    }
}
