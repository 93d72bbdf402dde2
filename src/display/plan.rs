//! Trail map planning
//!
//! Runs on the cooperative scheduler, never on the offload context. Every
//! track log is read twice with a [`ChunkedTrackReader`]: once to find the
//! bounding box of all trails, markers and junctions, and once to project
//! the points to panel pixels. Only the projected [`TrailMap`] crosses to
//! the renderer.

use super::{Polyline, TrailMap};
use crate::core::file_lock::FileLock;
use crate::devices::gps::{METERS_PER_DEG_LAT, METERS_PER_DEG_LON};
use crate::platform::error::StorageError;
use crate::platform::traits::{Point, Storage};
use crate::tracks::index::{
    self, IndexError, JunctionIndex, MarkerIndex, TrackIndex, JUNCTION_INDEX_PATH,
    MARKER_INDEX_PATH, TRACK_INDEX_PATH,
};
use crate::tracks::log::{is_track_path, TRACK_DIR};
use crate::tracks::{ChunkedTrackReader, LatLon, TrackError};
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Blank border around the map, in pixels
const MAP_MARGIN: u16 = 5;

/// Trail map planning errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    Storage(StorageError),
    Index(IndexError),
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::Storage(e) => write!(f, "storage error: {}", e),
            PlanError::Index(e) => write!(f, "index error: {}", e),
        }
    }
}

impl From<StorageError> for PlanError {
    fn from(e: StorageError) -> Self {
        PlanError::Storage(e)
    }
}

impl From<IndexError> for PlanError {
    fn from(e: IndexError) -> Self {
        PlanError::Index(e)
    }
}

#[derive(Debug, Clone, Copy)]
struct Bounds {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

impl Bounds {
    fn around(p: LatLon) -> Self {
        Self {
            min_lat: p.latitude,
            max_lat: p.latitude,
            min_lon: p.longitude,
            max_lon: p.longitude,
        }
    }

    fn include(&mut self, p: LatLon) {
        self.min_lat = self.min_lat.min(p.latitude);
        self.max_lat = self.max_lat.max(p.latitude);
        self.min_lon = self.min_lon.min(p.longitude);
        self.max_lon = self.max_lon.max(p.longitude);
    }
}

fn include(bounds: &mut Option<Bounds>, p: LatLon) {
    match bounds {
        Some(b) => b.include(p),
        None => *bounds = Some(Bounds::around(p)),
    }
}

/// Equal-scale projection of a bounding box onto the panel, centered
struct Projection {
    bounds: Bounds,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
    size: (u16, u16),
}

impl Projection {
    fn new(bounds: Bounds, size: (u16, u16)) -> Self {
        let avail_w = f64::from(size.0.saturating_sub(2 * MAP_MARGIN));
        let avail_h = f64::from(size.1.saturating_sub(2 * MAP_MARGIN));
        let span_x = (bounds.max_lon - bounds.min_lon) * METERS_PER_DEG_LON;
        let span_y = (bounds.max_lat - bounds.min_lat) * METERS_PER_DEG_LAT;

        let scale = match (span_x > 0.0, span_y > 0.0) {
            (true, true) => (avail_w / span_x).min(avail_h / span_y),
            (true, false) => avail_w / span_x,
            (false, true) => avail_h / span_y,
            (false, false) => 0.0,
        };
        let margin = f64::from(MAP_MARGIN);
        Self {
            bounds,
            scale,
            offset_x: margin + (avail_w - span_x * scale) / 2.0,
            offset_y: margin + (avail_h - span_y * scale) / 2.0,
            size,
        }
    }

    fn project(&self, p: LatLon) -> Point {
        let x = self.offset_x + (p.longitude - self.bounds.min_lon) * METERS_PER_DEG_LON * self.scale;
        let y = self.offset_y + (self.bounds.max_lat - p.latitude) * METERS_PER_DEG_LAT * self.scale;
        (to_pixel(x, self.size.0), to_pixel(y, self.size.1))
    }
}

fn to_pixel(v: f64, limit: u16) -> u16 {
    let max = f64::from(limit.saturating_sub(1));
    (v + 0.5).clamp(0.0, max) as u16
}

/// Plan the map of every recorded trail for a panel of `size` pixels
///
/// A track log that cannot be read is left off the map with a warning; a
/// malformed index file fails the whole plan.
pub async fn plan_trail_map<S: Storage>(
    files: &FileLock<S>,
    size: (u16, u16),
    chunk_lines: usize,
    default_width: u8,
) -> Result<TrailMap, PlanError> {
    let tracks = track_paths(files).await?;
    let widths: TrackIndex = index::load(files, TRACK_INDEX_PATH).await?;
    let markers: MarkerIndex = index::load(files, MARKER_INDEX_PATH).await?;
    let junctions: JunctionIndex = index::load(files, JUNCTION_INDEX_PATH).await?;

    let marker_points: Vec<LatLon> = markers
        .markers
        .iter()
        .map(|m| LatLon {
            latitude: m.lat,
            longitude: m.long,
        })
        .collect();
    let junction_points: Vec<LatLon> = junctions
        .junctions
        .iter()
        .map(|j| LatLon {
            latitude: j.lat,
            longitude: j.long,
        })
        .collect();

    // Pass 1: bounds
    let mut bounds = None;
    let mut readable = Vec::with_capacity(tracks.len());
    for path in tracks {
        match track_bounds(files, &path, chunk_lines, &mut bounds).await {
            Ok(()) => readable.push(path),
            Err(e) => crate::log_warn!("Skipping track: {}", e),
        }
    }
    for p in marker_points.iter().chain(junction_points.iter()) {
        include(&mut bounds, *p);
    }
    let Some(bounds) = bounds else {
        return Ok(TrailMap::default());
    };
    let projection = Projection::new(bounds, size);

    // Pass 2: projection
    let mut map = TrailMap::default();
    for path in readable {
        let width = widths.get(&path).map_or(default_width, |meta| meta.width);
        match project_track(files, &path, chunk_lines, &projection).await {
            Ok(points) if !points.is_empty() => map.polylines.push(Polyline { width, points }),
            Ok(_) => {}
            Err(e) => crate::log_warn!("Skipping track: {}", e),
        }
    }
    map.markers = marker_points.iter().map(|p| projection.project(*p)).collect();
    map.junctions = junction_points.iter().map(|p| projection.project(*p)).collect();

    crate::log_info!(
        "Planned trail map: {} trails, {} markers, {} junctions",
        map.polylines.len(),
        map.markers.len(),
        map.junctions.len()
    );
    Ok(map)
}

async fn track_paths<S: Storage>(files: &FileLock<S>) -> Result<Vec<String>, StorageError> {
    let guard = files.exclusive().await;
    let mut paths = match guard.list(TRACK_DIR) {
        Ok(paths) => paths,
        Err(StorageError::NotFound) => Vec::new(),
        Err(e) => return Err(e),
    };
    paths.retain(|p| is_track_path(p));
    paths.sort();
    Ok(paths)
}

async fn track_bounds<S: Storage>(
    files: &FileLock<S>,
    path: &str,
    chunk_lines: usize,
    bounds: &mut Option<Bounds>,
) -> Result<(), TrackError> {
    let mut reader = ChunkedTrackReader::open(files, path, chunk_lines).await?;
    while let Some(p) = reader.next().await? {
        include(bounds, p);
    }
    Ok(())
}

async fn project_track<S: Storage>(
    files: &FileLock<S>,
    path: &str,
    chunk_lines: usize,
    projection: &Projection,
) -> Result<Vec<Point>, TrackError> {
    let mut reader = ChunkedTrackReader::open(files, path, chunk_lines).await?;
    let mut points: Vec<Point> = Vec::new();
    while let Some(p) = reader.next().await? {
        let pixel = projection.project(p);
        if points.last() != Some(&pixel) {
            points.push(pixel);
        }
    }
    Ok(points)
}
