use std::path::PathBuf;

use eframe::egui::{self, Align2, Key, Sense};
use tracing::{error, info};

use super::plot;
use crate::session::{Discard, RecorderSession, SessionNotice};
use crate::view::PixelRect;

/// Wheel travel (points) that scrolls one tick.
const WHEEL_STEP: f32 = 50.0;

/// Something the operator asked for that would drop unsaved data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingAction {
    New,
    Open,
    Quit,
}

/// Main window state.
pub struct RecorderApp {
    session: RecorderSession,
    drag_origin: Option<(f64, f64)>,
    selection: Option<PixelRect>,
    wheel: egui::Vec2,
    error: Option<String>,
    pending: Option<PendingAction>,
    allow_close: bool,
    status: String,
}

impl RecorderApp {
    /// Window around an idle session.
    pub fn new(session: RecorderSession) -> Self {
        Self {
            session,
            drag_origin: None,
            selection: None,
            wheel: egui::Vec2::ZERO,
            error: None,
            pending: None,
            allow_close: false,
            status: "Idle".to_string(),
        }
    }

    fn handle_notices(&mut self) {
        for notice in self.session.poll_events() {
            match notice {
                SessionNotice::Started => self.status = "Recording".to_string(),
                SessionNotice::Stopped => self.status = "Stopped".to_string(),
                SessionNotice::Redraw => {}
                SessionNotice::Error(message) => self.error = Some(message),
            }
        }
    }

    fn report<T>(&mut self, result: crate::error::AppResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                error!(error = %e, "Operation failed");
                self.error = Some(e.to_string());
                None
            }
        }
    }

    fn request(&mut self, action: PendingAction) {
        if self.session.is_recording() {
            self.error = Some("Stop the recording first.".to_string());
        } else if self.session.has_unsaved_data() {
            self.pending = Some(action);
        } else {
            self.perform(action);
        }
    }

    fn perform(&mut self, action: PendingAction) {
        match action {
            PendingAction::New => {
                let result = self.session.new_document(Discard::Yes);
                self.report(result);
            }
            PendingAction::Open => {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("CSV", &["csv"])
                    .pick_file()
                {
                    let result = self.session.open(&path, Discard::Yes);
                    if self.report(result).is_some() {
                        info!(path = %path.display(), "Opened");
                        self.status = path.display().to_string();
                    }
                }
            }
            PendingAction::Quit => self.allow_close = true,
        }
    }

    /// Returns true when the data was written.
    fn save(&mut self) -> bool {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV", &["csv"])
            .set_file_name(self.session.suggested_filename())
            .save_file()
        else {
            return false;
        };
        let path = with_csv_extension(path);
        let result = self.session.save(&path);
        match self.report(result) {
            Some(rows) => {
                self.status = format!("Saved {rows} rows to {}", path.display());
                true
            }
            None => false,
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        let recording = self.session.is_recording();
        ui.horizontal(|ui| {
            if ui.add_enabled(!recording, egui::Button::new("New")).clicked() {
                self.request(PendingAction::New);
            }
            if ui.add_enabled(!recording, egui::Button::new("Open")).clicked() {
                self.request(PendingAction::Open);
            }
            if ui.button("Save").clicked() {
                self.save();
            }
            ui.separator();
            let label = if recording { "Stop" } else { "Record" };
            if ui.button(label).clicked() {
                let result = self.session.toggle_recording();
                self.report(result);
            }
            ui.separator();
            let zoom = self.session.zoom();
            let (can_in, can_out) = (zoom.can_zoom_in(), zoom.can_zoom_out());
            if ui.add_enabled(can_in, egui::Button::new("Zoom in")).clicked() {
                self.session.zoom_in();
            }
            if ui.add_enabled(can_out, egui::Button::new("Zoom out")).clicked() {
                self.session.zoom_out();
            }
        });
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let (zoom_in, zoom_out, dx, dy, stack, wheel) = ctx.input(|i| {
            let mut dx = 0.0;
            let mut dy = 0.0;
            if i.key_pressed(Key::ArrowLeft) {
                dx -= 1.0;
            }
            if i.key_pressed(Key::ArrowRight) {
                dx += 1.0;
            }
            if i.key_pressed(Key::ArrowDown) {
                dy -= 1.0;
            }
            if i.key_pressed(Key::ArrowUp) {
                dy += 1.0;
            }
            (
                i.key_pressed(Key::Plus) || i.key_pressed(Key::Equals),
                i.key_pressed(Key::Minus),
                dx,
                dy,
                i.key_pressed(Key::S),
                i.raw_scroll_delta,
            )
        });

        if zoom_in {
            self.session.zoom_in();
        }
        if zoom_out {
            self.session.zoom_out();
        }
        if stack {
            self.session.toggle_trace_offset();
        }

        // Wheel deltas accumulate until they amount to whole ticks.
        self.wheel += wheel;
        let ticks_x = (self.wheel.x / WHEEL_STEP).trunc();
        let ticks_y = (self.wheel.y / WHEEL_STEP).trunc();
        self.wheel -= egui::vec2(ticks_x, ticks_y) * WHEEL_STEP;

        let dx = dx + f64::from(ticks_x);
        let dy = dy + f64::from(ticks_y);
        if dx != 0.0 || dy != 0.0 {
            self.session.scroll(dx, dy);
        }
    }

    fn plot(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::drag());
        let rect = response.rect;
        let local = |pos: egui::Pos2| (f64::from(pos.x - rect.min.x), f64::from(pos.y - rect.min.y));

        if response.drag_started() {
            self.drag_origin = response.interact_pointer_pos().map(local);
        }
        if let (Some(origin), Some(pos)) = (self.drag_origin, response.interact_pointer_pos()) {
            self.selection = Some(PixelRect::from_corners(origin, local(pos)));
        }
        if response.drag_stopped() {
            if let Some(selection) = self.selection.take() {
                self.session.zoom_to(selection, &plot::plot_area(rect));
            }
            self.drag_origin = None;
        }

        plot::paint(&painter, rect, &self.session, self.selection);
    }

    fn error_dialog(&mut self, ctx: &egui::Context) {
        let Some(message) = self.error.clone() else {
            return;
        };
        egui::Window::new("Error")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(message);
                if ui.button("OK").clicked() {
                    self.error = None;
                }
            });
    }

    fn unsaved_dialog(&mut self, ctx: &egui::Context) {
        let Some(action) = self.pending else {
            return;
        };
        let mut choice = None;
        egui::Window::new("Unsaved data")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("The recording has not been saved.");
                ui.horizontal(|ui| {
                    if ui.button("Save").clicked() {
                        choice = Some(Choice::Save);
                    }
                    if ui.button("Discard").clicked() {
                        choice = Some(Choice::Discard);
                    }
                    if ui.button("Cancel").clicked() {
                        choice = Some(Choice::Cancel);
                    }
                });
            });

        match choice {
            Some(Choice::Save) => {
                if self.save() {
                    self.pending = None;
                    self.perform(action);
                }
            }
            Some(Choice::Discard) => {
                self.pending = None;
                self.perform(action);
            }
            Some(Choice::Cancel) => self.pending = None,
            None => {}
        }
    }

    fn handle_close(&mut self, ctx: &egui::Context) {
        if self.allow_close {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }
        if ctx.input(|i| i.viewport().close_requested()) && self.session.has_unsaved_data() {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            if !self.session.is_recording() {
                self.pending = Some(PendingAction::Quit);
            } else {
                self.error = Some("Stop the recording first.".to_string());
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Choice {
    Save,
    Discard,
    Cancel,
}

fn with_csv_extension(path: PathBuf) -> PathBuf {
    if path.extension().is_some() {
        path
    } else {
        path.with_extension("csv")
    }
}

impl eframe::App for RecorderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_notices();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(&self.status);
                if let Some(last) = self.session.store().latest_time() {
                    ui.separator();
                    ui.label(format!("{last:.2} s"));
                }
                if self.session.has_unsaved_data() {
                    ui.separator();
                    ui.label("unsaved");
                }
            });
        });
        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| self.plot(ui));

        if self.error.is_none() && self.pending.is_none() {
            self.handle_keys(ctx);
        }
        self.error_dialog(ctx);
        self.unsaved_dialog(ctx);
        self.handle_close(ctx);

        if self.session.is_recording() {
            ctx.request_repaint_after(self.session.config().display.render_interval());
        }
    }
}
