//! Terminal stand-in for the e-paper panel
//!
//! Drawing goes into a character grid, one cell per 4x8 pixels. `refresh`
//! waits like the real panel does and then prints the frame.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use trail_mapper::platform::error::DisplayError;
use trail_mapper::platform::traits::{Display, Point};

const CELL_W: u16 = 4;
const CELL_H: u16 = 8;

#[derive(Debug, Default)]
struct Frame {
    grid: Vec<Vec<char>>,
    texts: Vec<String>,
    last_shown: Option<String>,
    refreshes: usize,
}

/// Character-grid panel; clones share the same frame
#[derive(Debug, Clone)]
pub struct ConsolePanel {
    size: (u16, u16),
    refresh_delay: Duration,
    echo: bool,
    frame: Arc<Mutex<Frame>>,
}

impl ConsolePanel {
    pub fn new(width: u16, height: u16) -> Self {
        let panel = Self {
            size: (width, height),
            refresh_delay: Duration::ZERO,
            echo: true,
            frame: Arc::new(Mutex::new(Frame::default())),
        };
        panel.with_frame(|frame| frame.grid = panel.blank());
        panel
    }

    /// Block for `delay` on every refresh
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// Keep frames off stdout
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    /// The last frame shown by `refresh`
    pub fn last_frame(&self) -> Option<String> {
        self.with_frame(|frame| frame.last_shown.clone())
    }

    pub fn refreshes(&self) -> usize {
        self.with_frame(|frame| frame.refreshes)
    }

    fn blank(&self) -> Vec<Vec<char>> {
        let columns = usize::from(self.size.0.div_ceil(CELL_W));
        let rows = usize::from(self.size.1.div_ceil(CELL_H));
        vec![vec![' '; columns]; rows]
    }

    fn with_frame<T>(&self, f: impl FnOnce(&mut Frame) -> T) -> T {
        let mut frame = self.frame.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut frame)
    }

    fn check(&self, (x, y): Point) -> Result<(), DisplayError> {
        if x >= self.size.0 || y >= self.size.1 {
            return Err(DisplayError::OutOfBounds);
        }
        Ok(())
    }

    fn plot(frame: &mut Frame, (x, y): Point, ink: char) {
        let (row, column) = (usize::from(y / CELL_H), usize::from(x / CELL_W));
        if let Some(cell) = frame.grid.get_mut(row).and_then(|r| r.get_mut(column)) {
            // Markers stay visible over trails
            if *cell != 'M' {
                *cell = ink;
            }
        }
    }
}

fn ink_for(width: u8) -> char {
    match width {
        0..=1 => '.',
        2..=3 => '*',
        _ => '#',
    }
}

impl Display for ConsolePanel {
    fn size(&self) -> (u16, u16) {
        self.size
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        let blank = self.blank();
        self.with_frame(|frame| {
            frame.grid = blank;
            frame.texts.clear();
        });
        Ok(())
    }

    fn draw_text(&mut self, origin: Point, text: &str) -> Result<(), DisplayError> {
        self.check(origin)?;
        self.with_frame(|frame| frame.texts.push(text.to_string()));
        Ok(())
    }

    fn draw_line(&mut self, from: Point, to: Point, width: u8) -> Result<(), DisplayError> {
        self.check(from)?;
        self.check(to)?;
        let ink = ink_for(width);
        let (mut x, mut y) = (i32::from(from.0), i32::from(from.1));
        let (x1, y1) = (i32::from(to.0), i32::from(to.1));
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        self.with_frame(|frame| loop {
            // Both endpoints were bounds-checked, so the walk stays in range
            Self::plot(frame, (x as u16, y as u16), ink);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        });
        Ok(())
    }

    fn draw_marker(&mut self, at: Point) -> Result<(), DisplayError> {
        self.check(at)?;
        self.with_frame(|frame| {
            let (row, column) = (usize::from(at.1 / CELL_H), usize::from(at.0 / CELL_W));
            if let Some(cell) = frame.grid.get_mut(row).and_then(|r| r.get_mut(column)) {
                *cell = 'M';
            }
        });
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), DisplayError> {
        if !self.refresh_delay.is_zero() {
            std::thread::sleep(self.refresh_delay);
        }
        let echo = self.echo;
        self.with_frame(|frame| {
            let width = frame.grid.first().map_or(0, Vec::len);
            let border = format!("+{}+", "-".repeat(width));
            let mut shown = String::new();
            shown.push_str(&border);
            shown.push('\n');
            for row in &frame.grid {
                shown.push('|');
                shown.extend(row.iter());
                shown.push_str("|\n");
            }
            shown.push_str(&border);
            shown.push('\n');
            for text in &frame.texts {
                shown.push_str(text);
                shown.push('\n');
            }
            if echo {
                println!("{}", shown);
            }
            frame.last_shown = Some(shown);
            frame.refreshes += 1;
        });
        Ok(())
    }
}
