//! Mock filesystem for testing

use crate::platform::{
    error::StorageError,
    traits::{File, OpenMode, Storage},
};
use std::collections::BTreeMap;
use std::string::{String, ToString};
use std::sync::{Arc, Mutex, MutexGuard};
use std::vec::Vec;

#[derive(Debug, Default)]
struct Volume {
    files: BTreeMap<String, Vec<u8>>,
    open_handles: usize,
    peak_open: usize,
}

/// In-memory volume enforcing the one-open-file rule
///
/// Clones share the same volume, so a test can keep a handle for
/// inspection after moving the storage into a `FileLock`.
#[derive(Debug, Clone, Default)]
pub struct MockStorage {
    volume: Arc<Mutex<Volume>>,
}

/// Open file on a [`MockStorage`] volume
#[derive(Debug)]
pub struct MockFile {
    volume: Arc<Mutex<Volume>>,
    path: String,
    position: usize,
    mode: OpenMode,
}

fn lock(volume: &Arc<Mutex<Volume>>) -> MutexGuard<'_, Volume> {
    volume.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockStorage {
    /// Create an empty volume
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a file on the volume (test setup)
    pub fn insert_file(&self, path: &str, content: &[u8]) {
        lock(&self.volume)
            .files
            .insert(path.to_string(), content.to_vec());
    }

    /// Raw content of a file
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        lock(&self.volume).files.get(path).cloned()
    }

    /// Content of a file as UTF-8 text
    pub fn text(&self, path: &str) -> Option<String> {
        self.contents(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// All file paths on the volume
    pub fn paths(&self) -> Vec<String> {
        lock(&self.volume).files.keys().cloned().collect()
    }

    /// Number of currently open handles
    pub fn open_handles(&self) -> usize {
        lock(&self.volume).open_handles
    }

    /// Highest number of simultaneously open handles seen
    pub fn peak_open(&self) -> usize {
        lock(&self.volume).peak_open
    }
}

impl Storage for MockStorage {
    type File = MockFile;

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<MockFile, StorageError> {
        if path.is_empty() || path.ends_with('/') {
            return Err(StorageError::InvalidPath);
        }
        let mut volume = lock(&self.volume);
        if volume.open_handles > 0 {
            return Err(StorageError::AlreadyOpen);
        }
        let position = match mode {
            OpenMode::Read => {
                if !volume.files.contains_key(path) {
                    return Err(StorageError::NotFound);
                }
                0
            }
            OpenMode::Write => {
                volume.files.insert(path.to_string(), Vec::new());
                0
            }
            OpenMode::Append => volume.files.entry(path.to_string()).or_default().len(),
        };
        volume.open_handles += 1;
        volume.peak_open = volume.peak_open.max(volume.open_handles);
        Ok(MockFile {
            volume: Arc::clone(&self.volume),
            path: path.to_string(),
            position,
            mode,
        })
    }

    fn remove(&mut self, path: &str) -> Result<(), StorageError> {
        lock(&self.volume)
            .files
            .remove(path)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), StorageError> {
        let mut volume = lock(&self.volume);
        let content = volume.files.remove(from).ok_or(StorageError::NotFound)?;
        volume.files.insert(to.to_string(), content);
        Ok(())
    }

    fn exists(&mut self, path: &str) -> bool {
        lock(&self.volume).files.contains_key(path)
    }

    fn list(&mut self, dir: &str) -> Result<Vec<String>, StorageError> {
        let prefix = std::format!("{}/", dir.trim_end_matches('/'));
        Ok(lock(&self.volume)
            .files
            .keys()
            .filter(|path| {
                path.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .cloned()
            .collect())
    }
}

impl File for MockFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        let volume = lock(&self.volume);
        let content = volume.files.get(&self.path).ok_or(StorageError::NotFound)?;
        let start = self.position.min(content.len());
        let n = core::cmp::min(buf.len(), content.len() - start);
        buf[..n].copy_from_slice(&content[start..start + n]);
        drop(volume);
        self.position += n;
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), StorageError> {
        if self.mode == OpenMode::Read {
            return Err(StorageError::WriteFailed);
        }
        let mut volume = lock(&self.volume);
        let content = volume.files.entry(self.path.clone()).or_default();
        if self.mode == OpenMode::Append {
            self.position = content.len();
        }
        let end = self.position + data.len();
        if content.len() < end {
            content.resize(end, 0);
        }
        content[self.position..end].copy_from_slice(data);
        self.position = end;
        Ok(())
    }

    fn seek(&mut self, offset: u64) -> Result<(), StorageError> {
        let len = self.len()?;
        if offset > len {
            return Err(StorageError::SeekFailed);
        }
        self.position = offset as usize;
        Ok(())
    }

    fn len(&mut self) -> Result<u64, StorageError> {
        lock(&self.volume)
            .files
            .get(&self.path)
            .map(|content| content.len() as u64)
            .ok_or(StorageError::NotFound)
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

impl Drop for MockFile {
    fn drop(&mut self) {
        let mut volume = lock(&self.volume);
        volume.open_handles = volume.open_handles.saturating_sub(1);
    }
}
