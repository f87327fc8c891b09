//! Everything between the stored series and the screen: the zoom history, grid
//! computation and the decimating renderer. Nothing here touches the acquisition
//! thread.

pub mod grid;
pub mod render;
pub mod zoom;

pub use grid::{format_label, GridLine, GridLines};
pub use render::{DecimatingRenderer, PlotPoint, Polyline};
pub use zoom::{adjust_axis, PixelRect, PlotArea, ZoomStack, ZoomWindow, MIN_TICKS};
