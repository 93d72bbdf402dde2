//! Chunked track log reader
//!
//! Reads a track log a few lines at a time so memory stays bounded by one
//! chunk and no task holds the file lock (or the executor) for long:
//!
//! 1. lock, read the header, find the latitude/longitude columns, remember
//!    the offset after the header, unlock
//! 2. lock, seek to the saved offset, read up to `chunk_lines` lines,
//!    remember the new offset, unlock, yield to the executor
//! 3. repeat until a read returns no lines or a blank line is seen
//!
//! The reader is fused: after the end (or an error) it only returns
//! `Ok(None)`. It cannot be restarted; open a new one for another pass.

use super::{LatLon, TrackError};
use crate::core::file_lock::FileLock;
use crate::platform::error::StorageError;
use crate::platform::traits::{File, OpenMode, Storage};
use alloc::collections::VecDeque;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// Lines read per lock hold
pub const DEFAULT_CHUNK_LINES: usize = 20;

const READ_BLOCK: usize = 128;

/// Lazy, finite sequence of coordinates from one track log
pub struct ChunkedTrackReader<'a, S: Storage> {
    files: &'a FileLock<S>,
    path: String,
    latitude_col: usize,
    longitude_col: usize,
    offset: u64,
    line: usize,
    chunk_lines: usize,
    pending: VecDeque<LatLon>,
    finished: bool,
}

impl<'a, S: Storage> ChunkedTrackReader<'a, S> {
    /// Open `path` and parse its header
    ///
    /// An empty file yields an empty sequence. A header without a column
    /// containing `latitude` or `longitude` is an error naming the file.
    pub async fn open(
        files: &'a FileLock<S>,
        path: &str,
        chunk_lines: usize,
    ) -> Result<Self, TrackError> {
        let (header, offset) = {
            let mut file = files.open(path, OpenMode::Read).await?;
            let (mut lines, offset) = read_lines(&mut *file, 0, 1)?;
            (lines.pop(), offset)
        };

        let mut reader = Self {
            files,
            path: path.to_string(),
            latitude_col: 0,
            longitude_col: 0,
            offset,
            line: 1,
            chunk_lines: chunk_lines.max(1),
            pending: VecDeque::new(),
            finished: false,
        };

        match header {
            Some(header) if !header.is_empty() => {
                reader.latitude_col = reader.column(&header, "latitude")?;
                reader.longitude_col = reader.column(&header, "longitude")?;
            }
            _ => reader.finished = true,
        }
        Ok(reader)
    }

    /// Path of the log being read
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Next coordinate pair, or `None` at the end of the log
    pub async fn next(&mut self) -> Result<Option<LatLon>, TrackError> {
        loop {
            if let Some(point) = self.pending.pop_front() {
                return Ok(Some(point));
            }
            if self.finished {
                return Ok(None);
            }
            if let Err(e) = self.fill().await {
                self.finished = true;
                self.pending.clear();
                return Err(e);
            }
            embassy_futures::yield_now().await;
        }
    }

    /// Drain the remaining pairs into a vector
    pub async fn collect(mut self) -> Result<Vec<LatLon>, TrackError> {
        let mut points = Vec::new();
        while let Some(point) = self.next().await? {
            points.push(point);
        }
        Ok(points)
    }

    async fn fill(&mut self) -> Result<(), TrackError> {
        let (lines, offset) = {
            let mut file = self.files.open(&self.path, OpenMode::Read).await?;
            read_lines(&mut *file, self.offset, self.chunk_lines)?
        };
        self.offset = offset;

        if lines.is_empty() {
            self.finished = true;
            return Ok(());
        }
        for text in lines {
            self.line += 1;
            if text.is_empty() {
                self.finished = true;
                break;
            }
            let point = self.parse_row(&text)?;
            self.pending.push_back(point);
        }
        Ok(())
    }

    fn column(&self, header: &str, name: &'static str) -> Result<usize, TrackError> {
        header
            .split(',')
            .position(|column| column.contains(name))
            .ok_or_else(|| TrackError::MissingColumn {
                file: self.path.clone(),
                column: name,
            })
    }

    fn parse_row(&self, text: &str) -> Result<LatLon, TrackError> {
        let fields: Vec<&str> = text.split(',').collect();
        let field = |index: usize| -> Result<f64, TrackError> {
            let raw = fields.get(index).ok_or_else(|| self.parse_error("missing field"))?;
            raw.trim()
                .parse::<f64>()
                .map_err(|_| self.parse_error("not a number"))
        };
        Ok(LatLon {
            latitude: field(self.latitude_col)?,
            longitude: field(self.longitude_col)?,
        })
    }

    fn parse_error(&self, reason: &'static str) -> TrackError {
        TrackError::Parse {
            file: self.path.clone(),
            line: self.line,
            reason,
        }
    }
}

/// Read up to `max_lines` lines starting at `offset`
///
/// Returns the lines without their terminators and the offset just past
/// the last line returned. A final line without a newline counts as a
/// line.
fn read_lines<F: File + ?Sized>(
    file: &mut F,
    offset: u64,
    max_lines: usize,
) -> Result<(Vec<String>, u64), StorageError> {
    file.seek(offset)?;
    let mut lines = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    let mut consumed = offset;
    let mut buf = [0u8; READ_BLOCK];

    'read: while lines.len() < max_lines {
        let n = file.read(&mut buf)?;
        if n == 0 {
            if !current.is_empty() {
                consumed += current.len() as u64;
                lines.push(decode_line(&current));
            }
            break;
        }
        for &byte in &buf[..n] {
            current.push(byte);
            if byte == b'\n' {
                consumed += current.len() as u64;
                lines.push(decode_line(&current));
                current.clear();
                if lines.len() == max_lines {
                    break 'read;
                }
            }
        }
    }
    Ok((lines, consumed))
}

fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(&['\r', '\n'][..])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockStorage;
    use std::format;

    const PATH: &str = "tracks/TMC_t_1.csv";

    fn log_with_rows(rows: usize) -> String {
        let mut text = String::from("time,latitude,longitude,satellites visible,pdop\n");
        for i in 0..rows {
            text.push_str(&format!("{},{}.5,-{}.25,8,1.1\n", i, i, i));
        }
        text
    }

    async fn read_all(storage: &MockStorage, chunk: usize) -> Result<Vec<LatLon>, TrackError> {
        let files = FileLock::new(storage.clone());
        ChunkedTrackReader::open(&files, PATH, chunk).await?.collect().await
    }

    #[tokio::test]
    async fn test_yields_every_row_for_any_chunk_size() {
        let storage = MockStorage::new();
        storage.insert_file(PATH, log_with_rows(45).as_bytes());

        for chunk in [1, 2, 7, 20, 44, 45, 46, 100] {
            let points = read_all(&storage, chunk).await.unwrap();
            assert_eq!(points.len(), 45, "chunk size {}", chunk);
            assert_eq!(points[0], LatLon { latitude: 0.5, longitude: -0.25 });
            assert_eq!(points[44], LatLon { latitude: 44.5, longitude: -44.25 });
        }
        assert_eq!(storage.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_empty_and_header_only_files_yield_nothing() {
        let storage = MockStorage::new();
        storage.insert_file(PATH, b"");
        assert!(read_all(&storage, 20).await.unwrap().is_empty());

        storage.insert_file(PATH, log_with_rows(0).as_bytes());
        assert!(read_all(&storage, 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_line_ends_sequence() {
        let storage = MockStorage::new();
        let text = format!("{}\n1,9.0,9.0,1,1\n", log_with_rows(3));
        storage.insert_file(PATH, text.as_bytes());
        assert_eq!(read_all(&storage, 2).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_columns_found_by_substring_in_any_order() {
        let storage = MockStorage::new();
        storage.insert_file(PATH, b"gps longitude,gps latitude\r\n10,20\r\n11,21");
        let points = read_all(&storage, 20).await.unwrap();
        assert_eq!(
            points,
            vec![
                LatLon { latitude: 20.0, longitude: 10.0 },
                LatLon { latitude: 21.0, longitude: 11.0 },
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_column_names_file() {
        let storage = MockStorage::new();
        storage.insert_file(PATH, b"time,lat,long\n1,2,3\n");
        let err = read_all(&storage, 20).await.unwrap_err();
        assert_eq!(
            err,
            TrackError::MissingColumn {
                file: PATH.to_string(),
                column: "latitude"
            }
        );
        assert!(format!("{}", err).contains(PATH));
    }

    #[tokio::test]
    async fn test_column_match_is_case_sensitive() {
        let storage = MockStorage::new();
        storage.insert_file(PATH, b"Latitude,Longitude\n1,2\n");
        assert!(matches!(
            read_all(&storage, 20).await,
            Err(TrackError::MissingColumn { .. })
        ));
    }

    #[tokio::test]
    async fn test_bad_number_reports_line_and_fuses() {
        let storage = MockStorage::new();
        storage.insert_file(PATH, b"latitude,longitude\n1,2\nx,3\n4,5\n");
        let files = FileLock::new(storage.clone());
        let mut reader = ChunkedTrackReader::open(&files, PATH, 20).await.unwrap();

        let err = reader.next().await.unwrap_err();
        assert_eq!(
            err,
            TrackError::Parse {
                file: PATH.to_string(),
                line: 3,
                reason: "not a number"
            }
        );
        assert_eq!(reader.next().await, Ok(None));
    }

    #[tokio::test]
    async fn test_lock_is_free_between_chunks() {
        let storage = MockStorage::new();
        storage.insert_file(PATH, log_with_rows(5).as_bytes());
        let files = FileLock::new(storage.clone());
        let mut reader = ChunkedTrackReader::open(&files, PATH, 2).await.unwrap();

        assert!(reader.next().await.unwrap().is_some());
        assert!(!files.is_locked());
        // Another task can append while a reader is mid-file
        {
            let mut file = files.open(PATH, OpenMode::Append).await.unwrap();
            file.write_all(b"9,9.5,9.5,8,1\n").unwrap();
        }
        let mut count = 1;
        while reader.next().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 6);
    }

    #[tokio::test]
    async fn test_missing_file_is_storage_error() {
        let storage = MockStorage::new();
        assert_eq!(
            read_all(&storage, 20).await.unwrap_err(),
            TrackError::Storage(StorageError::NotFound)
        );
    }
}
