//! CSV track logs
//!
//! One file per recording session under `tracks/`, named from the
//! sanitized description and the fix time at creation:
//!
//! ```text
//! tracks/TMC_<description>_<unix seconds>.csv
//! time,latitude,longitude,satellites visible,pdop
//! 764426119,48.1173,11.516666666666667,8,0.9
//! ```
//!
//! Logs are append-only; the header is written once when the file is
//! created.

use super::TrackError;
use crate::core::file_lock::FileLock;
use crate::devices::gps::FixSample;
use crate::platform::traits::{File, OpenMode, Storage};
use alloc::format;
use alloc::string::String;

/// Directory holding the track logs
pub const TRACK_DIR: &str = "tracks";

/// Prefix of every track log file name
pub const TRACK_PREFIX: &str = "TMC_";

/// Header row of a track log
pub const TRACK_HEADER: &str = "time,latitude,longitude,satellites visible,pdop";

/// One row of a track log
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackLogEntry {
    pub time: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub satellites: u8,
    pub pdop: f32,
}

impl From<&FixSample> for TrackLogEntry {
    fn from(fix: &FixSample) -> Self {
        Self {
            time: fix.timestamp_utc,
            latitude: fix.latitude,
            longitude: fix.longitude,
            satellites: fix.satellites,
            pdop: fix.pdop,
        }
    }
}

impl TrackLogEntry {
    /// CSV row including the trailing newline
    pub fn to_row(&self) -> String {
        format!(
            "{},{},{},{},{}\n",
            self.time, self.latitude, self.longitude, self.satellites, self.pdop
        )
    }
}

/// Clean a user-supplied description for use in a file name
///
/// Surrounding whitespace is dropped and form-encoded spaces (`+`) become
/// underscores, as does anything outside `[A-Za-z0-9_-]`.
pub fn sanitize_description(description: &str) -> String {
    let cleaned: String = description
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        String::from("trail")
    } else {
        cleaned
    }
}

/// Path of the log for a session started at `fix_time`
pub fn track_file_name(description: &str, fix_time: i64) -> String {
    format!(
        "{}/{}{}_{}.csv",
        TRACK_DIR,
        TRACK_PREFIX,
        sanitize_description(description),
        fix_time
    )
}

/// Whether `path` names a track log (`tracks/<name>.csv`, no nesting)
pub fn is_track_path(path: &str) -> bool {
    path.strip_prefix(TRACK_DIR)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|name| {
            name.len() > 4
                && name.ends_with(".csv")
                && !name.contains('/')
                && !name.contains("..")
        })
}

/// Create (or truncate) a log and write its header
pub async fn create_log<S: Storage>(files: &FileLock<S>, path: &str) -> Result<(), TrackError> {
    let mut file = files.open(path, OpenMode::Write).await?;
    file.write_all(TRACK_HEADER.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(())
}

/// Append one row to an existing log
pub async fn append_entry<S: Storage>(
    files: &FileLock<S>,
    path: &str,
    entry: &TrackLogEntry,
) -> Result<(), TrackError> {
    let mut file = files.open(path, OpenMode::Append).await?;
    file.write_all(entry.to_row().as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockStorage;

    #[test]
    fn test_file_name_from_description() {
        assert_eq!(track_file_name("test", 764426119), "tracks/TMC_test_764426119.csv");
        assert_eq!(
            track_file_name("  river+loop ", 5),
            "tracks/TMC_river_loop_5.csv"
        );
        assert_eq!(track_file_name("../etc", 1), "tracks/TMC____etc_1.csv");
        assert_eq!(track_file_name("", 1), "tracks/TMC_trail_1.csv");
    }

    #[test]
    fn test_is_track_path() {
        assert!(is_track_path("tracks/TMC_a_1.csv"));
        assert!(!is_track_path("tracks/../config.json"));
        assert!(!is_track_path("tracks/sub/a.csv"));
        assert!(!is_track_path("tracks.json"));
        assert!(!is_track_path("tracks/.csv"));
    }

    #[test]
    fn test_row_format() {
        let entry = TrackLogEntry {
            time: 100,
            latitude: 40.5,
            longitude: -74.25,
            satellites: 7,
            pdop: 1.5,
        };
        assert_eq!(entry.to_row(), "100,40.5,-74.25,7,1.5\n");
    }

    #[tokio::test]
    async fn test_create_then_append() {
        let storage = MockStorage::new();
        let files = FileLock::new(storage.clone());
        let path = track_file_name("walk", 42);

        create_log(&files, &path).await.unwrap();
        let entry = TrackLogEntry {
            time: 43,
            latitude: 1.0,
            longitude: 2.0,
            satellites: 5,
            pdop: 2.0,
        };
        append_entry(&files, &path, &entry).await.unwrap();

        assert_eq!(
            storage.text(&path).unwrap(),
            "time,latitude,longitude,satellites visible,pdop\n43,1,2,5,2\n"
        );
    }
}
