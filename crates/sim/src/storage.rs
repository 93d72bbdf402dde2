//! Track volume backed by a host directory
//!
//! Paths are relative to the data directory and use `/` separators, the
//! same as on the device volume. Like the device filesystem only one file
//! may be open at a time; a second `open` fails with
//! [`StorageError::AlreadyOpen`].

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use trail_mapper::platform::error::StorageError;
use trail_mapper::platform::traits::{File, OpenMode, Storage};

#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
    busy: Arc<AtomicBool>,
}

impl DirStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        if path.is_empty() || path.ends_with('/') {
            return Err(StorageError::InvalidPath);
        }
        let relative = Path::new(path);
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(StorageError::InvalidPath);
        }
        Ok(self.root.join(relative))
    }
}

fn storage_error(e: io::Error) -> StorageError {
    match e.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound,
        io::ErrorKind::InvalidInput => StorageError::InvalidPath,
        _ => StorageError::Io,
    }
}

/// An open file; releases the volume when dropped
#[derive(Debug)]
pub struct DirFile {
    file: fs::File,
    busy: Arc<AtomicBool>,
}

impl Storage for DirStorage {
    type File = DirFile;

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<DirFile, StorageError> {
        let full = self.resolve(path)?;
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(StorageError::AlreadyOpen);
        }
        let opened = match mode {
            OpenMode::Read => OpenOptions::new().read(true).open(&full),
            OpenMode::Write | OpenMode::Append => {
                let created = match full.parent() {
                    Some(parent) => fs::create_dir_all(parent),
                    None => Ok(()),
                };
                created.and_then(|()| {
                    let mut options = OpenOptions::new();
                    options.read(true).create(true);
                    if mode == OpenMode::Append {
                        options.append(true);
                    } else {
                        options.write(true).truncate(true);
                    }
                    options.open(&full)
                })
            }
        };
        match opened {
            Ok(file) => Ok(DirFile {
                file,
                busy: Arc::clone(&self.busy),
            }),
            Err(e) => {
                self.busy.store(false, Ordering::Release);
                Err(storage_error(e))
            }
        }
    }

    fn remove(&mut self, path: &str) -> Result<(), StorageError> {
        fs::remove_file(self.resolve(path)?).map_err(storage_error)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), StorageError> {
        fs::rename(self.resolve(from)?, self.resolve(to)?).map_err(storage_error)
    }

    fn exists(&mut self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|full| full.is_file())
    }

    fn list(&mut self, dir: &str) -> Result<Vec<String>, StorageError> {
        let dir = dir.trim_end_matches('/');
        let entries = fs::read_dir(self.resolve(dir)?).map_err(storage_error)?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(storage_error)?;
            if !entry.file_type().map_err(storage_error)?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                paths.push(format!("{}/{}", dir, name));
            }
        }
        Ok(paths)
    }
}

impl File for DirFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.file.read(buf).map_err(|_| StorageError::ReadFailed)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), StorageError> {
        self.file.write_all(data).map_err(|e| match e.kind() {
            io::ErrorKind::StorageFull => StorageError::NoSpace,
            _ => StorageError::WriteFailed,
        })
    }

    fn seek(&mut self, offset: u64) -> Result<(), StorageError> {
        if offset > self.len()? {
            return Err(StorageError::SeekFailed);
        }
        self.file
            .seek(SeekFrom::Start(offset))
            .map(|_| ())
            .map_err(|_| StorageError::SeekFailed)
    }

    fn len(&mut self) -> Result<u64, StorageError> {
        self.file
            .metadata()
            .map(|meta| meta.len())
            .map_err(storage_error)
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.file.flush().map_err(|_| StorageError::WriteFailed)
    }
}

impl Drop for DirFile {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::scratch_dir;

    #[test]
    fn test_one_open_file_at_a_time() {
        let dir = scratch_dir("one_open");
        let mut storage = DirStorage::new(&dir);
        let first = storage.open("tracks/a.csv", OpenMode::Write).unwrap();
        assert_eq!(
            storage.open("tracks/b.csv", OpenMode::Write).err(),
            Some(StorageError::AlreadyOpen)
        );
        drop(first);
        assert!(storage.open("tracks/b.csv", OpenMode::Write).is_ok());
    }

    #[test]
    fn test_failed_open_releases_volume() {
        let dir = scratch_dir("failed_open");
        let mut storage = DirStorage::new(&dir);
        assert_eq!(
            storage.open("missing.json", OpenMode::Read).err(),
            Some(StorageError::NotFound)
        );
        assert!(storage.open("present.json", OpenMode::Write).is_ok());
    }

    #[test]
    fn test_rejects_paths_outside_the_volume() {
        let dir = scratch_dir("escape");
        let mut storage = DirStorage::new(&dir);
        assert_eq!(
            storage.open("../etc/passwd", OpenMode::Read).err(),
            Some(StorageError::InvalidPath)
        );
        assert_eq!(
            storage.open("/etc/passwd", OpenMode::Read).err(),
            Some(StorageError::InvalidPath)
        );
        assert!(!storage.exists("../escape"));
    }

    #[test]
    fn test_append_seek_and_list() {
        let dir = scratch_dir("append");
        let mut storage = DirStorage::new(&dir);
        {
            let mut file = storage.open("tracks/TMC_a_1.csv", OpenMode::Append).unwrap();
            file.write_all(b"header\n").unwrap();
        }
        {
            let mut file = storage.open("tracks/TMC_a_1.csv", OpenMode::Append).unwrap();
            file.write_all(b"row\n").unwrap();
            assert_eq!(file.len(), Ok(11));
        }
        let mut file = storage.open("tracks/TMC_a_1.csv", OpenMode::Read).unwrap();
        file.seek(7).unwrap();
        let mut buf = [0u8; 16];
        let n = file.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"row\n");
        assert_eq!(file.seek(12), Err(StorageError::SeekFailed));
        drop(file);

        assert_eq!(storage.list("tracks").unwrap(), vec![String::from("tracks/TMC_a_1.csv")]);
        assert_eq!(storage.list("nowhere"), Err(StorageError::NotFound));
    }
}
