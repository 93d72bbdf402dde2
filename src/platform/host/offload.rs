//! OS-thread offload context
//!
//! Stands in for the second core on the host. A single persistent worker
//! thread receives work items over a channel and runs them one by one with
//! [`execute`], which sets the readiness signal after every job. Panics are
//! caught so one bad job does not take the worker down.

use crate::core::offload::{execute, OffloadContext, OffloadError, OffloadTarget, ReadinessSignal, WorkItem};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

/// Persistent worker thread fed by the dispatcher
pub struct ThreadContext<J: Send + 'static> {
    sender: Option<Sender<WorkItem<J>>>,
    worker: Option<JoinHandle<()>>,
}

impl<J: Send + 'static> ThreadContext<J> {
    /// Start the worker thread that owns `target`
    pub fn spawn<T>(mut target: T, ready: &'static ReadinessSignal) -> Self
    where
        T: OffloadTarget<J> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel::<WorkItem<J>>();
        let worker = thread::Builder::new()
            .name("offload".into())
            .spawn(move || {
                while let Ok(item) = receiver.recv() {
                    let outcome = catch_unwind(AssertUnwindSafe(|| execute(&mut target, item, ready)));
                    if outcome.is_err() {
                        crate::log_error!("Offload job panicked");
                    }
                }
            });
        match worker {
            Ok(handle) => Self {
                sender: Some(sender),
                worker: Some(handle),
            },
            Err(e) => {
                crate::log_error!("Failed to start offload thread: {}", e);
                Self {
                    sender: None,
                    worker: None,
                }
            }
        }
    }
}

impl<J: Send + 'static> OffloadContext<J> for ThreadContext<J> {
    fn launch(&mut self, item: WorkItem<J>) -> Result<(), OffloadError> {
        self.sender
            .as_ref()
            .ok_or(OffloadError::ContextGone)?
            .send(item)
            .map_err(|_| OffloadError::ContextGone)
    }
}

impl<J: Send + 'static> Drop for ThreadContext<J> {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
