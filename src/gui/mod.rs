//! The eframe/egui implementation for the GUI.
//!
//! A single window: toolbar on top, the live plot in the centre and a status line at
//! the bottom. All recording logic lives in [`RecorderSession`]; this module only
//! translates input into session calls and paints what the session renders.

mod app;
mod plot;

pub use app::RecorderApp;

use anyhow::anyhow;
use eframe::egui;

use crate::config::RecorderConfig;
use crate::session::RecorderSession;

/// Open the viewer window and block until it is closed.
pub fn run(config: RecorderConfig) -> anyhow::Result<()> {
    let title = config.application.name.clone();
    let session = RecorderSession::from_config(config)?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1000.0, 650.0]),
        ..Default::default()
    };
    eframe::run_native(
        &title,
        options,
        Box::new(|_cc| Ok(Box::new(RecorderApp::new(session)))),
    )
    .map_err(|e| anyhow!("GUI error: {e}"))
}
