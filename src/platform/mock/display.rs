//! Mock e-paper display for testing

use crate::platform::{
    error::DisplayError,
    traits::{Display, Point},
};
use std::string::{String, ToString};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use std::vec::Vec;

/// A recorded drawing call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawOp {
    Clear,
    Text(Point, String),
    Line(Point, Point, u8),
    Marker(Point),
    Refresh,
}

/// Display that records every drawing call
///
/// Clones share the recording, so a test can keep one clone while the
/// other lives on the offload context.
#[derive(Debug, Clone)]
pub struct MockDisplay {
    size: (u16, u16),
    ops: Arc<Mutex<Vec<DrawOp>>>,
    refresh_delay: Option<Duration>,
}

impl MockDisplay {
    /// Create a display of the given size
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            size: (width, height),
            ops: Arc::new(Mutex::new(Vec::new())),
            refresh_delay: None,
        }
    }

    /// Make `refresh` block for `delay`, like a real panel
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    /// Drawing calls recorded so far
    pub fn ops(&self) -> Vec<DrawOp> {
        self.ops.lock().map(|ops| ops.clone()).unwrap_or_default()
    }

    /// Text drawn since the last clear, in order
    pub fn texts(&self) -> Vec<String> {
        let ops = self.ops();
        let start = ops
            .iter()
            .rposition(|op| *op == DrawOp::Clear)
            .map_or(0, |i| i + 1);
        ops[start..]
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text(_, text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of panel refreshes
    pub fn refreshes(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| **op == DrawOp::Refresh)
            .count()
    }

    fn record(&self, op: DrawOp) -> Result<(), DisplayError> {
        self.ops.lock().map_err(|_| DisplayError::Bus)?.push(op);
        Ok(())
    }

    fn check(&self, p: Point) -> Result<(), DisplayError> {
        if p.0 >= self.size.0 || p.1 >= self.size.1 {
            return Err(DisplayError::OutOfBounds);
        }
        Ok(())
    }
}

impl Display for MockDisplay {
    fn size(&self) -> (u16, u16) {
        self.size
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.record(DrawOp::Clear)
    }

    fn draw_text(&mut self, origin: Point, text: &str) -> Result<(), DisplayError> {
        self.check(origin)?;
        self.record(DrawOp::Text(origin, text.to_string()))
    }

    fn draw_line(&mut self, from: Point, to: Point, width: u8) -> Result<(), DisplayError> {
        self.check(from)?;
        self.check(to)?;
        self.record(DrawOp::Line(from, to, width))
    }

    fn draw_marker(&mut self, at: Point) -> Result<(), DisplayError> {
        self.check(at)?;
        self.record(DrawOp::Marker(at))
    }

    fn refresh(&mut self) -> Result<(), DisplayError> {
        if let Some(delay) = self.refresh_delay {
            std::thread::sleep(delay);
        }
        self.record(DrawOp::Refresh)
    }
}
