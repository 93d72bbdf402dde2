//! Scoped file lock
//!
//! The device volume tolerates a single open file at a time, and several
//! tasks (recorder, HTTP handlers, map planning) all want files. Every file
//! access therefore goes through one [`FileLock`], which owns the storage
//! and hands out scoped guards:
//!
//! - [`FileGuard`]: one open file; dropping it closes the file, then
//!   releases the lock
//! - [`StorageGuard`]: exclusive use of the volume for multi-step
//!   operations (list, remove, write-then-rename)
//!
//! Waiters are granted the lock in arrival order. Release hands the lock
//! directly to the oldest waiter, so a task that keeps re-acquiring cannot
//! starve the others. The lock is not reentrant: acquiring it again while
//! holding a guard deadlocks the task.
//!
//! # Example
//!
//! ```
//! use trail_mapper::core::file_lock::FileLock;
//! use trail_mapper::platform::mock::MockStorage;
//! use trail_mapper::platform::{File, OpenMode};
//!
//! let lock = FileLock::new(MockStorage::new());
//! embassy_futures::block_on(async {
//!     let mut file = lock.open("notes.txt", OpenMode::Write).await.unwrap();
//!     file.write_all(b"hello").unwrap();
//! });
//! assert!(!lock.is_locked());
//! ```

use crate::platform::{
    error::StorageError,
    traits::{File, OpenMode, Storage},
};
use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::future::Future;
use core::ops::{Deref, DerefMut};
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

struct Waiter {
    ticket: u32,
    waker: Option<Waker>,
    granted: bool,
}

struct LockState {
    held: bool,
    next_ticket: u32,
    waiters: VecDeque<Waiter>,
}

/// FIFO async lock owning the storage volume
pub struct FileLock<S: Storage> {
    state: Mutex<CriticalSectionRawMutex, RefCell<LockState>>,
    storage: Mutex<CriticalSectionRawMutex, RefCell<S>>,
}

impl<S: Storage> FileLock<S> {
    /// Wrap a mounted volume
    pub fn new(storage: S) -> Self {
        Self {
            state: Mutex::new(RefCell::new(LockState {
                held: false,
                next_ticket: 0,
                waiters: VecDeque::new(),
            })),
            storage: Mutex::new(RefCell::new(storage)),
        }
    }

    /// Whether some task currently holds the lock
    pub fn is_locked(&self) -> bool {
        self.state.lock(|cell| cell.borrow().held)
    }

    /// Number of tasks waiting for the lock
    pub fn waiters(&self) -> usize {
        self.state.lock(|cell| cell.borrow().waiters.len())
    }

    /// Acquire the lock and open `path`
    ///
    /// The lock is released again if the open fails.
    pub async fn open(&self, path: &str, mode: OpenMode) -> Result<FileGuard<'_, S>, StorageError> {
        let permit = self.acquire().await;
        let file = self.with_storage(|storage| storage.open(path, mode))?;
        Ok(FileGuard {
            file,
            _permit: permit,
        })
    }

    /// Acquire the lock for a sequence of volume operations
    pub async fn exclusive(&self) -> StorageGuard<'_, S> {
        StorageGuard {
            permit: self.acquire().await,
        }
    }

    async fn acquire(&self) -> LockPermit<'_, S> {
        Acquire {
            lock: self,
            ticket: None,
            done: false,
        }
        .await;
        LockPermit { lock: self }
    }

    fn with_storage<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        self.storage.lock(|cell| f(&mut cell.borrow_mut()))
    }

    fn release(&self) {
        let waker = self.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            match state.waiters.front_mut() {
                Some(next) => {
                    next.granted = true;
                    next.waker.take()
                }
                None => {
                    state.held = false;
                    None
                }
            }
        });
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

struct Acquire<'a, S: Storage> {
    lock: &'a FileLock<S>,
    ticket: Option<u32>,
    done: bool,
}

impl<S: Storage> Future for Acquire<'_, S> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let lock = this.lock;
        let ticket = &mut this.ticket;
        let granted = lock.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            match *ticket {
                None => {
                    if !state.held && state.waiters.is_empty() {
                        state.held = true;
                        return true;
                    }
                    let id = state.next_ticket;
                    state.next_ticket = state.next_ticket.wrapping_add(1);
                    state.waiters.push_back(Waiter {
                        ticket: id,
                        waker: Some(cx.waker().clone()),
                        granted: false,
                    });
                    *ticket = Some(id);
                    false
                }
                Some(id) => match state.waiters.iter().position(|w| w.ticket == id) {
                    Some(i) if state.waiters[i].granted => {
                        state.waiters.remove(i);
                        true
                    }
                    Some(i) => {
                        state.waiters[i].waker = Some(cx.waker().clone());
                        false
                    }
                    None => false,
                },
            }
        });
        if granted {
            this.done = true;
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

impl<S: Storage> Drop for Acquire<'_, S> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let Some(id) = self.ticket else {
            return;
        };
        // A cancelled waiter that was already handed the lock passes it on
        let was_granted = self.lock.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            match state.waiters.iter().position(|w| w.ticket == id) {
                Some(i) => state.waiters.remove(i).is_some_and(|w| w.granted),
                None => false,
            }
        });
        if was_granted {
            self.lock.release();
        }
    }
}

struct LockPermit<'a, S: Storage> {
    lock: &'a FileLock<S>,
}

impl<S: Storage> Drop for LockPermit<'_, S> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// An open file holding the lock
///
/// Fields drop in declaration order: the file closes before the permit
/// releases the lock.
pub struct FileGuard<'a, S: Storage> {
    file: S::File,
    _permit: LockPermit<'a, S>,
}

impl<S: Storage> FileGuard<'_, S> {
    /// Read the rest of the file from the current position
    pub fn read_to_end(&mut self) -> Result<Vec<u8>, StorageError> {
        read_remaining(&mut self.file)
    }

    /// Close the file and release the lock
    pub fn close(self) {}
}

impl<S: Storage> Deref for FileGuard<'_, S> {
    type Target = S::File;

    fn deref(&self) -> &S::File {
        &self.file
    }
}

impl<S: Storage> DerefMut for FileGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S::File {
        &mut self.file
    }
}

/// Exclusive use of the volume
pub struct StorageGuard<'a, S: Storage> {
    permit: LockPermit<'a, S>,
}

impl<S: Storage> StorageGuard<'_, S> {
    /// Open a file; it must be dropped before the next `open`
    pub fn open(&self, path: &str, mode: OpenMode) -> Result<S::File, StorageError> {
        self.permit.lock.with_storage(|storage| storage.open(path, mode))
    }

    /// Read a whole file
    pub fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let mut file = self.open(path, OpenMode::Read)?;
        read_remaining(&mut file)
    }

    /// Replace a file's content: write `path.tmp`, then rename over `path`
    ///
    /// The target is removed before the rename because not every
    /// filesystem renames over an existing file. A reader finding only the
    /// `.tmp` file after a power loss can recover it with
    /// [`StorageGuard::read_recovering`].
    pub fn write_atomic(&self, path: &str, content: &[u8]) -> Result<(), StorageError> {
        let tmp = tmp_path(path);
        {
            let mut file = self.open(&tmp, OpenMode::Write)?;
            file.write_all(content)?;
            file.flush()?;
        }
        if self.exists(path) {
            self.remove(path)?;
        }
        self.rename(&tmp, path)
    }

    /// Read `path`, falling back to a leftover `path.tmp` from an
    /// interrupted [`StorageGuard::write_atomic`]
    pub fn read_recovering(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        match self.read(path) {
            Err(StorageError::NotFound) => {
                let tmp = tmp_path(path);
                let content = self.read(&tmp)?;
                self.rename(&tmp, path)?;
                Ok(content)
            }
            other => other,
        }
    }

    /// Delete a file
    pub fn remove(&self, path: &str) -> Result<(), StorageError> {
        self.permit.lock.with_storage(|storage| storage.remove(path))
    }

    /// Rename a file
    pub fn rename(&self, from: &str, to: &str) -> Result<(), StorageError> {
        self.permit
            .lock
            .with_storage(|storage| storage.rename(from, to))
    }

    /// Whether a file exists
    pub fn exists(&self, path: &str) -> bool {
        self.permit.lock.with_storage(|storage| storage.exists(path))
    }

    /// Files directly inside `dir`
    pub fn list(&self, dir: &str) -> Result<Vec<String>, StorageError> {
        self.permit.lock.with_storage(|storage| storage.list(dir))
    }
}

fn tmp_path(path: &str) -> String {
    let mut tmp = String::from(path);
    tmp.push_str(".tmp");
    tmp
}

fn read_remaining<F: File>(file: &mut F) -> Result<Vec<u8>, StorageError> {
    let mut content = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            return Ok(content);
        }
        content.extend_from_slice(&buf[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::{Clock, MockClock};
    use crate::platform::mock::MockStorage;
    use std::cell::RefCell as StdRefCell;
    use std::vec;

    #[tokio::test]
    async fn test_guard_releases_on_drop() {
        let lock = FileLock::new(MockStorage::new());
        {
            let _file = lock.open("a.txt", OpenMode::Write).await.unwrap();
            assert!(lock.is_locked());
        }
        assert!(!lock.is_locked());
    }

    #[tokio::test]
    async fn test_failed_open_releases_lock() {
        let lock = FileLock::new(MockStorage::new());
        let err = lock.open("missing.txt", OpenMode::Read).await.err();
        assert_eq!(err, Some(StorageError::NotFound));
        assert!(!lock.is_locked());
    }

    #[tokio::test]
    async fn test_concurrent_writers_are_serialized() {
        let storage = MockStorage::new();
        let lock = FileLock::new(storage.clone());
        let clock = MockClock::new();
        let active = StdRefCell::new(0usize);
        let max_active = StdRefCell::new(0usize);

        let writer = |id: u8| {
            let lock = &lock;
            let clock = clock.clone();
            let active = &active;
            let max_active = &max_active;
            async move {
                for _ in 0..3 {
                    let mut file = lock.open("log.txt", OpenMode::Append).await.unwrap();
                    *active.borrow_mut() += 1;
                    let now = *active.borrow();
                    if now > *max_active.borrow() {
                        *max_active.borrow_mut() = now;
                    }
                    file.write_all(&[b'0' + id]).unwrap();
                    // Hold the lock across a suspension point
                    clock.sleep_ms(5).await;
                    file.write_all(&[b'0' + id]).unwrap();
                    *active.borrow_mut() -= 1;
                }
            }
        };

        tokio::join!(writer(1), writer(2), writer(3), writer(4));

        assert_eq!(*max_active.borrow(), 1);
        assert_eq!(storage.peak_open(), 1);
        let text = storage.text("log.txt").unwrap();
        assert_eq!(text.len(), 24);
        // Each hold wrote two identical bytes back to back
        for pair in text.as_bytes().chunks(2) {
            assert_eq!(pair[0], pair[1]);
        }
        assert!(!lock.is_locked());
    }

    #[tokio::test]
    async fn test_waiters_granted_in_arrival_order() {
        let lock = FileLock::new(MockStorage::new());
        let clock = MockClock::new();
        let order = StdRefCell::new(vec::Vec::new());

        let holder = async {
            let _guard = lock.exclusive().await;
            clock.sleep_ms(10).await;
            clock.sleep_ms(10).await;
        };
        let waiter = |id: u8| {
            let lock = &lock;
            let order = &order;
            async move {
                let _guard = lock.exclusive().await;
                order.borrow_mut().push(id);
            }
        };

        tokio::join!(holder, waiter(1), waiter(2), waiter(3));
        assert_eq!(*order.borrow(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_leaves_queue() {
        let lock = FileLock::new(MockStorage::new());
        let guard = lock.exclusive().await;

        {
            let mut pending = core::pin::pin!(lock.exclusive());
            let waker = noop_waker();
            let mut cx = Context::from_waker(&waker);
            assert!(pending.as_mut().poll(&mut cx).is_pending());
            assert_eq!(lock.waiters(), 1);
        }
        assert_eq!(lock.waiters(), 0);

        drop(guard);
        assert!(!lock.is_locked());
    }

    #[tokio::test]
    async fn test_granted_then_cancelled_waiter_passes_lock_on() {
        let lock = FileLock::new(MockStorage::new());
        let guard = lock.exclusive().await;
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut first = Box::pin(lock.exclusive());
        let mut second = Box::pin(lock.exclusive());
        assert!(first.as_mut().poll(&mut cx).is_pending());
        assert!(second.as_mut().poll(&mut cx).is_pending());

        // Release grants `first`, which is dropped before it runs
        drop(guard);
        drop(first);

        assert!(matches!(second.as_mut().poll(&mut cx), Poll::Ready(_)));
        assert_eq!(lock.waiters(), 0);
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_and_cleans_up() {
        let storage = MockStorage::new();
        storage.insert_file("tracks.json", b"{\"old\":1}");
        let lock = FileLock::new(storage.clone());

        lock.exclusive()
            .await
            .write_atomic("tracks.json", b"{}")
            .unwrap();

        assert_eq!(storage.text("tracks.json").unwrap(), "{}");
        assert!(!storage.paths().iter().any(|p| p.ends_with(".tmp")));
    }

    #[tokio::test]
    async fn test_read_recovering_uses_leftover_tmp() {
        let storage = MockStorage::new();
        storage.insert_file("markers.json.tmp", b"{\"markers\":[]}");
        let lock = FileLock::new(storage.clone());

        let content = lock
            .exclusive()
            .await
            .read_recovering("markers.json")
            .unwrap();

        assert_eq!(content, b"{\"markers\":[]}".to_vec());
        assert!(storage.text("markers.json").is_some());
    }

    struct NoopWake;

    impl std::task::Wake for NoopWake {
        fn wake(self: std::sync::Arc<Self>) {}
    }

    fn noop_waker() -> Waker {
        Waker::from(std::sync::Arc::new(NoopWake))
    }
}
