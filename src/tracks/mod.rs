//! Track logs and persisted indices
//!
//! - `log`: naming, creating and appending CSV track logs
//! - `reader`: lazy chunked reader over a track log
//! - `index`: `tracks.json`, `markers.json` and `junctions.json`

pub mod index;
pub mod log;
pub mod reader;

pub use index::{IndexError, Junction, JunctionIndex, Marker, MarkerIndex, TrackIndex, TrackMeta};
pub use log::{track_file_name, TrackLogEntry, TRACK_DIR, TRACK_HEADER};
pub use reader::{ChunkedTrackReader, DEFAULT_CHUNK_LINES};

use crate::platform::error::StorageError;
use alloc::string::String;
use core::fmt;

/// A (latitude, longitude) pair in signed degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub latitude: f64,
    pub longitude: f64,
}

/// Track log errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    /// Filesystem failure
    Storage(StorageError),
    /// Header row lacks a required column
    MissingColumn { file: String, column: &'static str },
    /// A data row could not be parsed
    Parse {
        file: String,
        line: usize,
        reason: &'static str,
    },
}

impl fmt::Display for TrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackError::Storage(e) => write!(f, "storage error: {}", e),
            TrackError::MissingColumn { file, column } => {
                write!(f, "{}: no column containing \"{}\"", file, column)
            }
            TrackError::Parse { file, line, reason } => {
                write!(f, "{}:{}: {}", file, line, reason)
            }
        }
    }
}

impl From<StorageError> for TrackError {
    fn from(e: StorageError) -> Self {
        TrackError::Storage(e)
    }
}
