//! Display interface trait
//!
//! Raster primitives of the e-paper panel. Drawing goes to an off-screen
//! buffer; [`Display::refresh`] pushes it to the panel and blocks for the
//! slow refresh cycle, which is why displays are only driven from the
//! offload context.

use crate::platform::error::DisplayError;

/// Pixel coordinate (x, y), origin top-left
pub type Point = (u16, u16);

/// Drawing surface of the panel
pub trait Display {
    /// Panel size (width, height) in pixels
    fn size(&self) -> (u16, u16);

    /// Clear the off-screen buffer to white
    fn clear(&mut self) -> Result<(), DisplayError>;

    /// Draw a line of text with its top-left corner at `origin`
    fn draw_text(&mut self, origin: Point, text: &str) -> Result<(), DisplayError>;

    /// Draw a line segment of the given stroke width
    fn draw_line(&mut self, from: Point, to: Point, width: u8) -> Result<(), DisplayError>;

    /// Draw a small filled marker centered on `at`
    fn draw_marker(&mut self, at: Point) -> Result<(), DisplayError>;

    /// Push the buffer to the panel (blocking)
    fn refresh(&mut self) -> Result<(), DisplayError>;
}
