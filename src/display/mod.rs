//! Render jobs for the e-paper panel
//!
//! Everything that crosses to the offload context is in this module: the
//! [`RenderJob`] values queued on the scheduler side and the [`Renderer`]
//! that owns the panel on the other side. Jobs are plain data; planning a
//! trail map (which needs the file lock) happens before the job is queued.

pub mod plan;
pub mod render;

pub use plan::{plan_trail_map, PlanError};
pub use render::Renderer;

use crate::core::state::DeviceState;
use crate::devices::gps::FixSample;
use crate::platform::traits::Point;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

/// Work for the offload renderer
#[derive(Debug, Clone, PartialEq)]
pub enum RenderJob {
    /// Recording status, drawn periodically while tracking
    Status(StatusFrame),
    /// Map of every recorded trail
    Trails(TrailMap),
    /// GPS diagnostic text, one `key: value` pair per line
    GpsDebug(String),
    /// Free text, one line per `\n`
    Text(String),
    /// Blank the panel
    Clear,
}

/// Snapshot shown while a recording is running
#[derive(Debug, Clone, PartialEq)]
pub struct StatusFrame {
    pub state: DeviceState,
    pub description: String,
    pub points_total: u32,
    /// Points logged since the previous status frame
    pub points_new: u32,
    pub fix: FixSample,
}

impl StatusFrame {
    /// Text lines of the frame, top to bottom
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(6);
        lines.push(format!("{} {}", self.state, self.description));
        lines.push(format!("points: {} (+{})", self.points_total, self.points_new));
        lines.push(format!("time: {}", clock_time(self.fix.timestamp_utc)));
        lines.push(format!("lat: {}", self.fix.latitude));
        lines.push(format!("long: {}", self.fix.longitude));
        lines.push(format!("sats: {}  pdop: {}", self.fix.satellites, self.fix.pdop));
        lines
    }
}

/// `HH:MM:SS` of a unix timestamp, UTC
fn clock_time(timestamp: i64) -> String {
    let secs = timestamp.rem_euclid(86_400);
    format!("{:02}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
}

/// One recorded trail projected to panel pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polyline {
    pub width: u8,
    pub points: Vec<Point>,
}

/// A fully projected trail map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrailMap {
    pub polylines: Vec<Polyline>,
    pub markers: Vec<Point>,
    pub junctions: Vec<Point>,
}

impl TrailMap {
    pub fn is_empty(&self) -> bool {
        self.polylines.is_empty() && self.markers.is_empty() && self.junctions.is_empty()
    }
}
