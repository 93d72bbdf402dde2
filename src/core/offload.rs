//! Hardware offload queue
//!
//! Blocking display work runs on a second execution context (core 1 on the
//! device, an OS thread on the host) so the cooperative executor keeps
//! serving the network, GPS and buttons.
//!
//! ```text
//!  producers ──enqueue()──▶ OffloadQueue ──▶ Dispatcher ──launch()──▶ OffloadContext
//!  (never wait)            (FIFO, priority      │  waits for            │ runs one job
//!                           items go first)     │  ReadinessSignal      │ sets signal on exit
//!                                               ◀───────────────────────┘
//! ```
//!
//! The dispatcher is the only consumer. It clears the readiness signal
//! right before launching a job and the worker sets it again from a drop
//! guard once the job has fully returned, whether it succeeded, failed or
//! panicked. That completion signal is what serializes jobs; the settle
//! delay after readiness is pacing for the panel, not synchronization.

use crate::core::traits::Clock;
use alloc::collections::VecDeque;
use core::cell::RefCell;
use core::fmt;
use core::future::poll_fn;
use core::sync::atomic::{AtomicBool, Ordering};
use core::task::Poll;
use critical_section::Mutex;
use embassy_sync::waitqueue::AtomicWaker;

/// How the offload context runs a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunMode {
    /// Call the blocking entry point directly
    Sync,
    /// Drive the async entry point on a private nested executor
    Async,
}

/// A queued job
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem<J> {
    pub job: J,
    pub mode: RunMode,
    pub priority: bool,
}

/// Offload failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OffloadError {
    /// The second context is gone and cannot take work
    ContextGone,
    /// The second context refused the job (hand-off channel full)
    ContextBusy,
    /// The job itself failed
    JobFailed(crate::platform::PlatformError),
}

impl fmt::Display for OffloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OffloadError::ContextGone => write!(f, "offload context is gone"),
            OffloadError::ContextBusy => write!(f, "offload context busy"),
            OffloadError::JobFailed(e) => write!(f, "offload job failed: {}", e),
        }
    }
}

impl From<crate::platform::PlatformError> for OffloadError {
    fn from(e: crate::platform::PlatformError) -> Self {
        OffloadError::JobFailed(e)
    }
}

/// Work that can run on the offload context
///
/// Jobs are plain data; the target owns the hardware it drives.
#[allow(async_fn_in_trait)]
pub trait OffloadTarget<J> {
    /// Run a job to completion, blocking the calling context
    fn run_blocking(&mut self, job: J) -> Result<(), OffloadError>;

    /// Run a job as a future
    async fn run_async(&mut self, job: J) -> Result<(), OffloadError>;
}

/// The second execution context, as seen from the dispatcher
pub trait OffloadContext<J> {
    /// Start `item` on the context without waiting for it
    ///
    /// The context must set `ready` when the job has returned.
    fn launch(&mut self, item: WorkItem<J>) -> Result<(), OffloadError>;
}

/// "Offload context idle" flag, initially set
pub struct ReadinessSignal {
    ready: AtomicBool,
    waker: AtomicWaker,
}

impl ReadinessSignal {
    pub const fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            waker: AtomicWaker::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Called by the dispatcher right before a launch
    pub fn clear(&self) {
        self.ready.store(false, Ordering::Release);
    }

    /// Called by the worker when a job has returned
    pub fn set(&self) {
        self.ready.store(true, Ordering::Release);
        self.waker.wake();
    }

    /// Wait until the signal is set
    pub async fn wait(&self) {
        poll_fn(|cx| {
            self.waker.register(cx.waker());
            if self.is_ready() {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await
    }
}

impl Default for ReadinessSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Sets the readiness signal when dropped, so every exit path of a job
/// (return, error, unwinding panic) reports completion
pub struct ReadyGuard<'a>(&'a ReadinessSignal);

impl<'a> ReadyGuard<'a> {
    pub fn new(signal: &'a ReadinessSignal) -> Self {
        Self(signal)
    }
}

impl Drop for ReadyGuard<'_> {
    fn drop(&mut self) {
        self.0.set();
    }
}

/// Run one work item on the current (offload) context
///
/// Async items are driven to completion by `embassy_futures::block_on`, a
/// nested executor private to this call. Failures are logged, not retried.
pub fn execute<J, T: OffloadTarget<J>>(target: &mut T, item: WorkItem<J>, ready: &ReadinessSignal) {
    let _guard = ReadyGuard::new(ready);
    let result = match item.mode {
        RunMode::Sync => target.run_blocking(item.job),
        RunMode::Async => embassy_futures::block_on(target.run_async(item.job)),
    };
    if let Err(e) = result {
        crate::log_error!("Offload job failed: {}", e);
    }
}

/// FIFO of pending offload jobs
///
/// Producers never wait: `enqueue` only touches the queue inside a short
/// critical section. The queue is unbounded; producers are expected to
/// enqueue at human or render-interval rates.
pub struct OffloadQueue<J> {
    items: Mutex<RefCell<VecDeque<WorkItem<J>>>>,
}

impl<J> OffloadQueue<J> {
    pub const fn new() -> Self {
        Self {
            items: Mutex::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Append a job, or put it at the front if `priority` is set
    pub fn enqueue(&self, job: J, mode: RunMode, priority: bool) {
        let item = WorkItem {
            job,
            mode,
            priority,
        };
        critical_section::with(|cs| {
            let mut items = self.items.borrow(cs).borrow_mut();
            if priority {
                items.push_front(item);
            } else {
                items.push_back(item);
            }
        });
    }

    /// Number of queued jobs
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.items.borrow(cs).borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pop(&self) -> Option<WorkItem<J>> {
        critical_section::with(|cs| self.items.borrow(cs).borrow_mut().pop_front())
    }
}

impl<J> Default for OffloadQueue<J> {
    fn default() -> Self {
        Self::new()
    }
}

/// Pacing of the dispatch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTiming {
    /// Sleep when the queue is empty
    pub idle_poll_ms: u64,
    /// Pause between readiness and the next launch
    pub settle_ms: u64,
}

impl Default for DispatchTiming {
    fn default() -> Self {
        Self {
            idle_poll_ms: 200,
            settle_ms: 100,
        }
    }
}

/// Sole consumer of an [`OffloadQueue`]
pub struct Dispatcher<'a, J, X: OffloadContext<J>, C: Clock> {
    queue: &'a OffloadQueue<J>,
    ready: &'a ReadinessSignal,
    context: X,
    clock: C,
    timing: DispatchTiming,
}

impl<'a, J, X: OffloadContext<J>, C: Clock> Dispatcher<'a, J, X, C> {
    pub fn new(
        queue: &'a OffloadQueue<J>,
        ready: &'a ReadinessSignal,
        context: X,
        clock: C,
        timing: DispatchTiming,
    ) -> Self {
        Self {
            queue,
            ready,
            context,
            clock,
            timing,
        }
    }

    /// Dispatch jobs forever
    pub async fn run(&mut self) -> ! {
        loop {
            if !self.dispatch_next().await {
                self.clock.sleep_ms(self.timing.idle_poll_ms).await;
            }
        }
    }

    /// Launch the head of the queue once the context is ready
    ///
    /// Returns false without waiting if the queue is empty.
    pub async fn dispatch_next(&mut self) -> bool {
        if self.queue.is_empty() {
            return false;
        }
        self.ready.wait().await;
        if self.timing.settle_ms > 0 {
            self.clock.sleep_ms(self.timing.settle_ms).await;
        }
        // Producers only add, so the queue is still non-empty here
        let Some(item) = self.queue.pop() else {
            return false;
        };
        self.ready.clear();
        if let Err(e) = self.context.launch(item) {
            crate::log_error!("Offload launch failed: {}", e);
            self.ready.set();
        }
        true
    }

    /// Wait until the context has finished its current job
    pub async fn wait_idle(&self) {
        self.ready.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::MockClock;
    use crate::platform::host::ThreadContext;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex as StdMutex};
    use std::vec::Vec;

    /// Records job order and checks that jobs never overlap
    #[derive(Clone, Default)]
    struct Recorder {
        order: Arc<StdMutex<Vec<char>>>,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
    }

    impl Recorder {
        fn run(&self, job: char) -> Result<(), OffloadError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            self.order.lock().unwrap().push(job);
            self.active.fetch_sub(1, Ordering::SeqCst);
            if job == 'X' {
                return Err(OffloadError::JobFailed(
                    crate::platform::PlatformError::ResourceUnavailable,
                ));
            }
            if job == 'P' {
                panic!("renderer crashed");
            }
            Ok(())
        }
    }

    impl OffloadTarget<char> for Recorder {
        fn run_blocking(&mut self, job: char) -> Result<(), OffloadError> {
            self.run(job)
        }

        async fn run_async(&mut self, job: char) -> Result<(), OffloadError> {
            embassy_futures::yield_now().await;
            self.run(job)
        }
    }

    fn leak_signal() -> &'static ReadinessSignal {
        Box::leak(Box::new(ReadinessSignal::new()))
    }

    #[test]
    fn test_priority_goes_to_front() {
        let queue = OffloadQueue::new();
        queue.enqueue('A', RunMode::Sync, false);
        queue.enqueue('B', RunMode::Sync, false);
        queue.enqueue('C', RunMode::Sync, false);
        queue.enqueue('D', RunMode::Sync, true);
        let order: Vec<char> = core::iter::from_fn(|| queue.pop().map(|i| i.job)).collect();
        assert_eq!(order, vec!['D', 'A', 'B', 'C']);
    }

    #[test]
    fn test_ready_guard_sets_signal() {
        let signal = ReadinessSignal::new();
        signal.clear();
        {
            let _guard = ReadyGuard::new(&signal);
            assert!(!signal.is_ready());
        }
        assert!(signal.is_ready());
    }

    #[test]
    fn test_execute_sets_ready_after_failure() {
        let signal = ReadinessSignal::new();
        let mut target = Recorder::default();
        signal.clear();
        execute(
            &mut target,
            WorkItem {
                job: 'X',
                mode: RunMode::Async,
                priority: false,
            },
            &signal,
        );
        assert!(signal.is_ready());
        assert_eq!(*target.order.lock().unwrap(), vec!['X']);
    }

    #[tokio::test]
    async fn test_dispatch_runs_one_job_at_a_time_in_order() {
        let ready = leak_signal();
        let target = Recorder::default();
        let context = ThreadContext::spawn(target.clone(), ready);
        let queue = OffloadQueue::new();
        let mut dispatcher = Dispatcher::new(
            &queue,
            ready,
            context,
            MockClock::new(),
            DispatchTiming {
                idle_poll_ms: 10,
                settle_ms: 0,
            },
        );

        queue.enqueue('A', RunMode::Sync, false);
        queue.enqueue('B', RunMode::Async, false);
        queue.enqueue('C', RunMode::Sync, false);
        queue.enqueue('D', RunMode::Async, true);

        while dispatcher.dispatch_next().await {}
        dispatcher.wait_idle().await;

        assert_eq!(*target.order.lock().unwrap(), vec!['D', 'A', 'B', 'C']);
        assert_eq!(target.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_and_panicking_jobs_do_not_stop_dispatch() {
        let ready = leak_signal();
        let target = Recorder::default();
        let context = ThreadContext::spawn(target.clone(), ready);
        let queue = OffloadQueue::new();
        let mut dispatcher = Dispatcher::new(
            &queue,
            ready,
            context,
            MockClock::new(),
            DispatchTiming::default(),
        );

        for job in ['X', 'P', 'Z'] {
            queue.enqueue(job, RunMode::Sync, false);
        }
        while dispatcher.dispatch_next().await {}
        dispatcher.wait_idle().await;

        assert_eq!(*target.order.lock().unwrap(), vec!['X', 'P', 'Z']);
        assert!(ready.is_ready());
    }

    #[tokio::test]
    async fn test_run_polls_empty_queue_then_dispatches() {
        let ready = leak_signal();
        let target = Recorder::default();
        let context = ThreadContext::spawn(target.clone(), ready);
        let queue = OffloadQueue::new();
        let clock = MockClock::new();
        let mut dispatcher = Dispatcher::new(
            &queue,
            ready,
            context,
            clock.clone(),
            DispatchTiming {
                idle_poll_ms: 200,
                settle_ms: 0,
            },
        );

        let producer = async {
            while clock.total_slept_ms() < 200 {
                embassy_futures::yield_now().await;
            }
            queue.enqueue('A', RunMode::Sync, false);
            while target.order.lock().unwrap().is_empty() {
                embassy_futures::yield_now().await;
            }
        };
        embassy_futures::select::select(dispatcher.run(), producer).await;

        assert_eq!(*target.order.lock().unwrap(), vec!['A']);
        assert!(clock.total_slept_ms() >= 200);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_empty_queue_does_not_wait_for_readiness() {
        let ready = leak_signal();
        ready.clear();
        let queue: OffloadQueue<char> = OffloadQueue::new();
        let context = ThreadContext::spawn(Recorder::default(), ready);
        let mut dispatcher = Dispatcher::new(
            &queue,
            ready,
            context,
            MockClock::new(),
            DispatchTiming::default(),
        );
        assert!(!dispatcher.dispatch_next().await);
    }
}
