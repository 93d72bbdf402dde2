//! Filesystem interface traits
//!
//! The device volume allows a single open file at a time. Implementations
//! are free to reject a second `open` with `StorageError::AlreadyOpen`;
//! callers go through `core::file_lock::FileLock`, which serializes every
//! access.

use crate::platform::error::StorageError;
use alloc::string::String;
use alloc::vec::Vec;

/// How a file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OpenMode {
    /// Read from the start; the file must exist
    Read,
    /// Create or truncate, then write
    Write,
    /// Create if missing, then write at the end
    Append,
}

/// An open file handle
///
/// Dropping the handle closes the file.
pub trait File {
    /// Read up to `buf.len()` bytes at the current position (0 at end of file)
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write all of `data` at the current position
    fn write_all(&mut self, data: &[u8]) -> Result<(), StorageError>;

    /// Move the position to an absolute byte offset
    fn seek(&mut self, offset: u64) -> Result<(), StorageError>;

    /// Total file size in bytes
    fn len(&mut self) -> Result<u64, StorageError>;

    /// Whether the file has no content
    fn is_empty(&mut self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Push buffered writes to the medium
    fn flush(&mut self) -> Result<(), StorageError>;
}

/// A mounted volume
pub trait Storage {
    /// Handle type produced by [`Storage::open`]
    type File: File;

    /// Open `path` in the given mode
    fn open(&mut self, path: &str, mode: OpenMode) -> Result<Self::File, StorageError>;

    /// Delete a file
    fn remove(&mut self, path: &str) -> Result<(), StorageError>;

    /// Rename a file, replacing `to` if it exists
    fn rename(&mut self, from: &str, to: &str) -> Result<(), StorageError>;

    /// Whether a file exists at `path`
    fn exists(&mut self, path: &str) -> bool;

    /// Paths (including the `dir/` prefix) of the files directly inside `dir`
    fn list(&mut self, dir: &str) -> Result<Vec<String>, StorageError>;
}
