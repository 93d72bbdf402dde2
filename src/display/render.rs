//! Offload renderer
//!
//! Owns the panel and lives on the offload context. Every job redraws the
//! whole screen: clear, draw, refresh.

use super::{RenderJob, TrailMap};
use crate::core::offload::{OffloadError, OffloadTarget};
use crate::platform::error::{DisplayError, PlatformError};
use crate::platform::traits::{Display, Point};

const TEXT_X: u16 = 5;
const TEXT_TOP: u16 = 5;
const LINE_HEIGHT: u16 = 13;
/// Half the arm length of a junction cross
const JUNCTION_ARM: u16 = 3;

/// Draws [`RenderJob`]s on a [`Display`]
pub struct Renderer<D: Display> {
    display: D,
}

impl<D: Display> Renderer<D> {
    pub fn new(display: D) -> Self {
        Self { display }
    }

    /// Panel size in pixels
    pub fn size(&self) -> (u16, u16) {
        self.display.size()
    }

    fn render(&mut self, job: RenderJob) -> Result<(), DisplayError> {
        self.display.clear()?;
        match job {
            RenderJob::Status(frame) => self.text_lines(frame.lines().iter().map(|l| l.as_str()))?,
            RenderJob::Trails(map) if map.is_empty() => {
                self.text_lines(core::iter::once("no trails recorded"))?
            }
            RenderJob::Trails(map) => {
                for polyline in &map.polylines {
                    self.polyline(&polyline.points, polyline.width)?;
                }
                self.points(&map)?;
            }
            RenderJob::GpsDebug(report) => {
                self.text_lines(report.lines().flat_map(|line| line.split(": ")))?
            }
            RenderJob::Text(text) => self.text_lines(text.lines())?,
            RenderJob::Clear => {}
        }
        self.display.refresh()
    }

    async fn render_async(&mut self, job: RenderJob) -> Result<(), DisplayError> {
        let map = match job {
            RenderJob::Trails(map) if !map.is_empty() => map,
            other => return self.render(other),
        };
        self.display.clear()?;
        for polyline in &map.polylines {
            self.polyline(&polyline.points, polyline.width)?;
            embassy_futures::yield_now().await;
        }
        self.points(&map)?;
        self.display.refresh()
    }

    fn text_lines<'t>(&mut self, lines: impl Iterator<Item = &'t str>) -> Result<(), DisplayError> {
        let height = self.display.size().1;
        let mut y = TEXT_TOP;
        for line in lines {
            if y >= height {
                break;
            }
            self.display.draw_text((TEXT_X, y), line)?;
            y = y.saturating_add(LINE_HEIGHT);
        }
        Ok(())
    }

    fn polyline(&mut self, points: &[Point], width: u8) -> Result<(), DisplayError> {
        match points {
            [] => Ok(()),
            [only] => self.display.draw_line(*only, *only, width),
            _ => {
                for pair in points.windows(2) {
                    self.display.draw_line(pair[0], pair[1], width)?;
                }
                Ok(())
            }
        }
    }

    fn points(&mut self, map: &TrailMap) -> Result<(), DisplayError> {
        for marker in &map.markers {
            self.display.draw_marker(*marker)?;
        }
        let (width, height) = self.display.size();
        let (max_x, max_y) = (width.saturating_sub(1), height.saturating_sub(1));
        for &(x, y) in &map.junctions {
            self.display.draw_line(
                (x.saturating_sub(JUNCTION_ARM), y),
                (x.saturating_add(JUNCTION_ARM).min(max_x), y),
                1,
            )?;
            self.display.draw_line(
                (x, y.saturating_sub(JUNCTION_ARM)),
                (x, y.saturating_add(JUNCTION_ARM).min(max_y)),
                1,
            )?;
        }
        Ok(())
    }
}

fn job_failed(e: DisplayError) -> OffloadError {
    OffloadError::JobFailed(PlatformError::from(e))
}

impl<D: Display> OffloadTarget<RenderJob> for Renderer<D> {
    fn run_blocking(&mut self, job: RenderJob) -> Result<(), OffloadError> {
        self.render(job).map_err(job_failed)
    }

    async fn run_async(&mut self, job: RenderJob) -> Result<(), OffloadError> {
        self.render_async(job).await.map_err(job_failed)
    }
}
