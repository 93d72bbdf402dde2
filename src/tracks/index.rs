//! Persisted JSON indices
//!
//! Three whole-file JSON documents live at the volume root:
//!
//! ```text
//! tracks.json     {"tracks/TMC_a_1.csv": {"width": 3, "start_time": 1, "description": "a"}}
//! markers.json    {"markers": [{"lat": 1.0, "long": 2.0, "text": "spring", "time": 1}]}
//! junctions.json  {"junctions": [{"lat": 1.0, "long": 2.0, "time": 1}]}
//! ```
//!
//! Updates are read-modify-write under one exclusive hold of the file lock
//! and replace the file through `write_atomic`, so a power cut mid-write
//! leaves either the old or the new document.

use crate::core::file_lock::{FileLock, StorageGuard};
use crate::platform::error::StorageError;
use crate::platform::traits::Storage;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Track metadata file
pub const TRACK_INDEX_PATH: &str = "tracks.json";
/// Marker file
pub const MARKER_INDEX_PATH: &str = "markers.json";
/// Junction file
pub const JUNCTION_INDEX_PATH: &str = "junctions.json";

/// Index file errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// Filesystem failure
    Storage(StorageError),
    /// File exists but is not the expected JSON document
    Malformed { file: &'static str },
    /// Document could not be serialized
    Encode,
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::Storage(e) => write!(f, "storage error: {}", e),
            IndexError::Malformed { file } => write!(f, "{}: malformed JSON document", file),
            IndexError::Encode => write!(f, "failed to encode JSON document"),
        }
    }
}

impl From<StorageError> for IndexError {
    fn from(e: StorageError) -> Self {
        IndexError::Storage(e)
    }
}

/// Metadata recorded when a track starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMeta {
    /// Stroke width used when the track is drawn
    pub width: u8,
    /// Fix time (unix seconds) at creation
    pub start_time: i64,
    #[serde(default)]
    pub description: String,
}

/// `tracks.json`: track log path → metadata
pub type TrackIndex = BTreeMap<String, TrackMeta>;

/// A point of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub lat: f64,
    pub long: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub time: i64,
}

/// `markers.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerIndex {
    #[serde(default)]
    pub markers: Vec<Marker>,
}

/// A trail junction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Junction {
    pub lat: f64,
    pub long: f64,
    #[serde(default)]
    pub time: i64,
}

/// `junctions.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JunctionIndex {
    #[serde(default)]
    pub junctions: Vec<Junction>,
}

/// Load a document, treating a missing file as the default document
pub async fn load<T, S>(files: &FileLock<S>, path: &'static str) -> Result<T, IndexError>
where
    T: DeserializeOwned + Default,
    S: Storage,
{
    let guard = files.exclusive().await;
    read_document(&guard, path)
}

/// Load, modify and store a document under one lock hold
pub async fn update<T, S, R>(
    files: &FileLock<S>,
    path: &'static str,
    change: impl FnOnce(&mut T) -> R,
) -> Result<R, IndexError>
where
    T: DeserializeOwned + Serialize + Default,
    S: Storage,
{
    let guard = files.exclusive().await;
    let mut document: T = read_document(&guard, path)?;
    let result = change(&mut document);
    let encoded = serde_json::to_vec(&document).map_err(|_| IndexError::Encode)?;
    guard.write_atomic(path, &encoded)?;
    Ok(result)
}

/// Record the metadata of a newly started track
pub async fn record_track_start<S: Storage>(
    files: &FileLock<S>,
    track_path: &str,
    meta: TrackMeta,
) -> Result<(), IndexError> {
    update(files, TRACK_INDEX_PATH, |index: &mut TrackIndex| {
        index.insert(String::from(track_path), meta);
    })
    .await
}

/// Append a marker; returns the new marker count
pub async fn add_marker<S: Storage>(files: &FileLock<S>, marker: Marker) -> Result<usize, IndexError> {
    update(files, MARKER_INDEX_PATH, |index: &mut MarkerIndex| {
        index.markers.push(marker);
        index.markers.len()
    })
    .await
}

/// Append a junction; returns the new junction count
pub async fn add_junction<S: Storage>(
    files: &FileLock<S>,
    junction: Junction,
) -> Result<usize, IndexError> {
    update(files, JUNCTION_INDEX_PATH, |index: &mut JunctionIndex| {
        index.junctions.push(junction);
        index.junctions.len()
    })
    .await
}

fn read_document<T, S>(guard: &StorageGuard<'_, S>, path: &'static str) -> Result<T, IndexError>
where
    T: DeserializeOwned + Default,
    S: Storage,
{
    match guard.read_recovering(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(T::default()),
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|_| IndexError::Malformed { file: path }),
        Err(StorageError::NotFound) => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}
