//! Painting the grid, the traces and the rubber band.

use eframe::egui::{self, Align2, Color32, FontId, Pos2, Rect, Shape, Stroke};

use crate::config::Rgb;
use crate::session::RecorderSession;
use crate::view::{PixelRect, PlotArea};

const LABEL_SIZE: f32 = 11.0;

fn color(rgb: Rgb) -> Color32 {
    Color32::from_rgb(rgb[0], rgb[1], rgb[2])
}

/// Plot geometry for a widget rectangle.
pub(super) fn plot_area(rect: Rect) -> PlotArea {
    PlotArea::new(f64::from(rect.width()), f64::from(rect.height()))
}

fn to_screen(origin: Pos2, x: f64, y: f64) -> Pos2 {
    egui::pos2(origin.x + x as f32, origin.y + y as f32)
}

/// Paint the whole plot into `rect`.
pub(super) fn paint(
    painter: &egui::Painter,
    rect: Rect,
    session: &RecorderSession,
    selection: Option<PixelRect>,
) {
    let display = &session.config().display;
    let foreground = color(display.foreground);
    painter.rect_filled(rect, 0.0, color(display.background));

    let area = plot_area(rect);
    if !area.is_valid() {
        return;
    }
    let origin = rect.min;
    paint_grid(painter, origin, &area, session, foreground);

    let traces = painter.with_clip_rect(Rect::from_min_max(
        to_screen(origin, area.left(), area.top()),
        to_screen(origin, area.right() + 1.0, area.bottom() + 1.0),
    ));
    for polyline in session.render(&area) {
        if polyline.points.len() < 2 {
            continue;
        }
        let points = polyline
            .points
            .iter()
            .map(|p| to_screen(origin, p.x, p.y))
            .collect();
        traces.add(Shape::line(points, Stroke::new(1.0, color(polyline.color))));
    }

    if let Some(band) = selection {
        let band = Rect::from_min_max(
            to_screen(origin, band.left, band.top),
            to_screen(origin, band.right, band.bottom),
        );
        painter.rect_stroke(band, 0.0, Stroke::new(1.0, foreground));
    }
}

fn paint_grid(
    painter: &egui::Painter,
    origin: Pos2,
    area: &PlotArea,
    session: &RecorderSession,
    foreground: Color32,
) {
    let grid = session.grid(area);
    let line = Stroke::new(1.0, foreground.gamma_multiply(0.35));
    let font = FontId::proportional(LABEL_SIZE);

    for tick in &grid.vertical {
        let top = to_screen(origin, tick.position, area.top());
        let bottom = to_screen(origin, tick.position, area.bottom());
        painter.line_segment([top, bottom], line);
        painter.text(
            bottom + egui::vec2(0.0, 5.0),
            Align2::CENTER_TOP,
            &tick.label,
            font.clone(),
            foreground,
        );
    }
    for tick in &grid.horizontal {
        let left = to_screen(origin, area.left(), tick.position);
        let right = to_screen(origin, area.right(), tick.position);
        painter.line_segment([left, right], line);
        painter.text(
            left - egui::vec2(5.0, 0.0),
            Align2::RIGHT_CENTER,
            &tick.label,
            font.clone(),
            foreground,
        );
    }

    let frame = Rect::from_min_max(
        to_screen(origin, area.left(), area.top()),
        to_screen(origin, area.right(), area.bottom()),
    );
    painter.rect_stroke(frame, 0.0, Stroke::new(1.0, foreground));
}
