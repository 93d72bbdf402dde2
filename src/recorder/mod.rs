//! Trail recording state machine
//!
//! ```text
//!  request_start() ─▶ begin_tracking ─▶ token ─▶ channel ─▶ run() ─▶ record()
//!  stop()          ─▶ request_stop ─▶ poll until Idle ─▶ queue trail map
//! ```
//!
//! HTTP handlers and button actions only flip the state and return; the
//! recording loop itself runs in the task that drives [`TrailRecorder::run`].
//! The loop owns the [`TrackingToken`], so whatever way it ends (stop,
//! storage error) the device is back to Idle afterwards.

use crate::config::RecorderConfig;
use crate::core::file_lock::FileLock;
use crate::core::offload::{OffloadQueue, RunMode};
use crate::core::state::{DeviceState, DeviceStateCell, TrackingToken};
use crate::core::traits::Clock;
use crate::devices::fix_source::FixSource;
use crate::display::{plan_trail_map, RenderJob, StatusFrame};
use crate::platform::traits::Storage;
use crate::tracks::index::{self, IndexError};
use crate::tracks::log::{append_entry, create_log, track_file_name, TrackLogEntry};
use crate::tracks::{TrackError, TrackMeta, DEFAULT_CHUNK_LINES};
use alloc::string::{String, ToString};
use core::fmt;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

/// Panel size assumed when none is configured (2.7" e-paper, landscape)
pub const DEFAULT_PANEL: (u16, u16) = (264, 176);

/// Errors that end a recording session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    Track(TrackError),
    Index(IndexError),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::Track(e) => write!(f, "track log: {}", e),
            RecordError::Index(e) => write!(f, "track index: {}", e),
        }
    }
}

impl From<TrackError> for RecordError {
    fn from(e: TrackError) -> Self {
        RecordError::Track(e)
    }
}

impl From<IndexError> for RecordError {
    fn from(e: IndexError) -> Self {
        RecordError::Index(e)
    }
}

/// A granted start, waiting for the recorder task
pub struct StartRequest<'a> {
    token: TrackingToken<'a>,
    description: String,
    width: u8,
}

/// Drives recording sessions
pub struct TrailRecorder<'a, S: Storage, G: FixSource, C: Clock> {
    state: &'a DeviceStateCell,
    files: &'a FileLock<S>,
    gps: &'a G,
    queue: &'a OffloadQueue<RenderJob>,
    clock: C,
    config: RecorderConfig,
    panel: (u16, u16),
    chunk_lines: usize,
    starts: Channel<CriticalSectionRawMutex, StartRequest<'a>, 1>,
}

impl<'a, S: Storage, G: FixSource, C: Clock> TrailRecorder<'a, S, G, C> {
    pub fn new(
        state: &'a DeviceStateCell,
        files: &'a FileLock<S>,
        gps: &'a G,
        queue: &'a OffloadQueue<RenderJob>,
        clock: C,
        config: RecorderConfig,
    ) -> Self {
        Self {
            state,
            files,
            gps,
            queue,
            clock,
            config,
            panel: DEFAULT_PANEL,
            chunk_lines: DEFAULT_CHUNK_LINES,
            starts: Channel::new(),
        }
    }

    /// Panel size and reader chunk used when planning trail maps
    pub fn with_map(mut self, panel: (u16, u16), chunk_lines: usize) -> Self {
        self.panel = panel;
        self.chunk_lines = chunk_lines;
        self
    }

    pub fn state(&self) -> DeviceState {
        self.state.get()
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Start recording and run the session to its end
    ///
    /// Returns `Ok(false)` without doing anything unless the device is
    /// idle.
    pub async fn start(&self, description: &str, width: u8) -> Result<bool, RecordError> {
        let Some(token) = self.state.begin_tracking() else {
            return Ok(false);
        };
        self.record(token, description, width).await?;
        Ok(true)
    }

    /// Move to Tracking and hand the session to [`TrailRecorder::run`]
    ///
    /// Returns false unless the device was idle.
    pub fn request_start(&self, description: &str, width: u8) -> bool {
        let Some(token) = self.state.begin_tracking() else {
            return false;
        };
        let request = StartRequest {
            token,
            description: description.to_string(),
            width,
        };
        // Dropping a refused request drops its token, back to Idle
        self.starts.try_send(request).is_ok()
    }

    /// Recorder task: run each requested session
    pub async fn run(&self) -> ! {
        loop {
            let request = self.starts.receive().await;
            if let Err(e) = self
                .record(request.token, &request.description, request.width)
                .await
            {
                crate::log_error!("Recording failed: {}", e);
            }
        }
    }

    async fn record(
        &self,
        token: TrackingToken<'_>,
        description: &str,
        width: u8,
    ) -> Result<(), RecordError> {
        let fix = self.gps.refresh(self.config.settle_cycles, false).await;
        let path = track_file_name(description, fix.timestamp_utc);
        crate::log_info!("Opening new log: {}", path);
        create_log(self.files, &path).await?;
        index::record_track_start(
            self.files,
            &path,
            TrackMeta {
                width,
                start_time: fix.timestamp_utc,
                description: description.to_string(),
            },
        )
        .await?;

        let mut points_total = 0u32;
        let mut points_new = 0u32;
        let mut last_render = self.clock.now_ms();
        loop {
            let fix = self.gps.refresh(1, false).await;
            append_entry(self.files, &path, &TrackLogEntry::from(&fix)).await?;
            points_total += 1;
            points_new += 1;

            if self.clock.elapsed_since(last_render) > self.config.render_interval_ms {
                let frame = StatusFrame {
                    state: self.state.get(),
                    description: description.to_string(),
                    points_total,
                    points_new,
                    fix,
                };
                self.queue.enqueue(RenderJob::Status(frame), RunMode::Sync, false);
                points_new = 0;
                last_render = self.clock.now_ms();
            }

            self.clock.sleep_ms(self.config.log_interval_ms).await;
            if token.stop_requested() {
                break;
            }
        }
        crate::log_info!("Closed {} after {} points", path, points_total);
        Ok(())
    }

    /// Stop the running session and wait until the device is idle
    ///
    /// Returns false without doing anything unless the device was
    /// tracking. On success a trail map job is queued.
    pub async fn stop(&self) -> bool {
        if !self.state.request_stop() {
            return false;
        }
        while self.state.get() != DeviceState::Idle {
            self.clock.sleep_ms(self.config.stop_poll_ms).await;
        }
        self.show_trails().await;
        true
    }

    /// Start with the configured defaults when idle, otherwise stop
    pub async fn toggle(&self) {
        match self.state.get() {
            DeviceState::Idle => {
                let description = self.config.default_description.clone();
                self.request_start(&description, self.config.default_width);
            }
            DeviceState::Tracking => {
                self.stop().await;
            }
            DeviceState::Stopping => crate::log_debug!("Stop already in progress"),
        }
    }

    /// Plan the map of all recorded trails and queue it for the panel
    pub async fn show_trails(&self) {
        match plan_trail_map(self.files, self.panel, self.chunk_lines, self.config.default_width).await {
            Ok(map) => self.queue.enqueue(RenderJob::Trails(map), RunMode::Async, false),
            Err(e) => crate::log_error!("Cannot plan trail map: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::offload::{Dispatcher, DispatchTiming, OffloadContext, OffloadError, ReadinessSignal, WorkItem};
    use crate::core::traits::MockClock;
    use crate::devices::gps::FixSample;
    use crate::platform::mock::MockStorage;
    use crate::tracks::{TrackIndex, TRACK_HEADER};
    use alloc::vec::Vec;
    use core::cell::{Cell, RefCell};
    use embassy_futures::select::select;

    /// Fix source walking north one step per refresh call
    #[derive(Default)]
    struct Walk {
        refreshes: Cell<u32>,
    }

    impl FixSource for Walk {
        async fn refresh(&self, _cycles: u32, _indicator_on: bool) -> FixSample {
            let n = self.refreshes.get();
            self.refreshes.set(n + 1);
            FixSample {
                latitude: 40.0 + f64::from(n) * 0.5,
                longitude: -75.0,
                timestamp_utc: 1000 + i64::from(n),
                satellites: 7,
                pdop: 1.5,
            }
        }

        async fn debug_report(&self, _cycles: u32) -> String {
            String::new()
        }
    }

    /// Context that only records what it was given
    struct Collect<'s> {
        items: &'s RefCell<Vec<WorkItem<RenderJob>>>,
        ready: &'s ReadinessSignal,
    }

    impl OffloadContext<RenderJob> for Collect<'_> {
        fn launch(&mut self, item: WorkItem<RenderJob>) -> Result<(), OffloadError> {
            self.items.borrow_mut().push(item);
            self.ready.set();
            Ok(())
        }
    }

    async fn drain(queue: &OffloadQueue<RenderJob>) -> Vec<WorkItem<RenderJob>> {
        let items = RefCell::new(Vec::new());
        let ready = ReadinessSignal::new();
        let timing = DispatchTiming {
            idle_poll_ms: 0,
            settle_ms: 0,
        };
        let mut dispatcher = Dispatcher::new(
            queue,
            &ready,
            Collect {
                items: &items,
                ready: &ready,
            },
            MockClock::new(),
            timing,
        );
        while dispatcher.dispatch_next().await {}
        drop(dispatcher);
        items.into_inner()
    }

    fn rows(storage: &MockStorage, path: &str) -> usize {
        storage.text(path).map_or(0, |text| text.lines().count().saturating_sub(1))
    }

    #[tokio::test]
    async fn test_start_is_noop_unless_idle() {
        let state = DeviceStateCell::new();
        let files = FileLock::new(MockStorage::new());
        let gps = Walk::default();
        let queue = OffloadQueue::new();
        let recorder = TrailRecorder::new(&state, &files, &gps, &queue, MockClock::new(), RecorderConfig::default());

        let _held = state.begin_tracking().unwrap();
        assert_eq!(recorder.start("walk", 3).await, Ok(false));
        assert!(!recorder.request_start("walk", 3));
        assert_eq!(gps.refreshes.get(), 0);
        assert_eq!(state.get(), DeviceState::Tracking);
    }

    #[tokio::test]
    async fn test_stop_is_noop_unless_tracking() {
        let state = DeviceStateCell::new();
        let files = FileLock::new(MockStorage::new());
        let gps = Walk::default();
        let queue = OffloadQueue::new();
        let recorder = TrailRecorder::new(&state, &files, &gps, &queue, MockClock::new(), RecorderConfig::default());

        assert!(!recorder.stop().await);
        assert!(queue.is_empty());
        assert_eq!(state.get(), DeviceState::Idle);
    }

    #[tokio::test]
    async fn test_session_logs_renders_and_stops() {
        let state = DeviceStateCell::new();
        let storage = MockStorage::new();
        let files = FileLock::new(storage.clone());
        let gps = Walk::default();
        let queue = OffloadQueue::new();
        let config = RecorderConfig {
            render_interval_ms: 3000,
            ..RecorderConfig::default()
        };
        let recorder = TrailRecorder::new(&state, &files, &gps, &queue, MockClock::new(), config);
        let path = "tracks/TMC_river_loop_1000.csv";

        let driver = async {
            assert!(recorder.request_start("river loop", 5));
            assert_eq!(recorder.state(), DeviceState::Tracking);
            while rows(&storage, path) < 3 {
                embassy_futures::yield_now().await;
            }
            assert!(recorder.stop().await);
        };
        select(recorder.run(), driver).await;

        assert_eq!(state.get(), DeviceState::Idle);
        let text = storage.text(path).unwrap();
        assert!(text.starts_with(TRACK_HEADER));
        assert_eq!(rows(&storage, path), 3);
        assert!(text.contains("\n1001,40.5,-75,7,1.5\n"));

        let index: TrackIndex = index::load(&files, index::TRACK_INDEX_PATH).await.unwrap();
        assert_eq!(index[path].width, 5);
        assert_eq!(index[path].start_time, 1000);
        assert_eq!(index[path].description, "river loop");

        let jobs = drain(&queue).await;
        assert_eq!(jobs.len(), 2);
        match &jobs[0].job {
            RenderJob::Status(frame) => {
                assert_eq!(frame.points_total, 3);
                assert_eq!(frame.points_new, 3);
                assert_eq!(frame.description, "river loop");
            }
            other => panic!("expected status frame, got {:?}", other),
        }
        assert_eq!(jobs[0].mode, RunMode::Sync);
        match &jobs[1].job {
            RenderJob::Trails(map) => assert_eq!(map.polylines.len(), 1),
            other => panic!("expected trail map, got {:?}", other),
        }
        assert_eq!(jobs[1].mode, RunMode::Async);
    }

    #[tokio::test]
    async fn test_storage_failure_returns_to_idle() {
        let state = DeviceStateCell::new();
        let storage = MockStorage::new();
        let files = FileLock::new(storage.clone());
        // An index that is not a JSON object fails the metadata write
        storage.insert_file("tracks.json", b"[]");
        let gps = Walk::default();
        let queue = OffloadQueue::new();
        let recorder = TrailRecorder::new(&state, &files, &gps, &queue, MockClock::new(), RecorderConfig::default());

        let result = recorder.start("walk", 3).await;
        assert!(matches!(result, Err(RecordError::Index(IndexError::Malformed { .. }))));
        assert_eq!(state.get(), DeviceState::Idle);
    }

    #[tokio::test]
    async fn test_toggle_starts_with_defaults() {
        let state = DeviceStateCell::new();
        let files = FileLock::new(MockStorage::new());
        let gps = Walk::default();
        let queue = OffloadQueue::new();
        let recorder = TrailRecorder::new(&state, &files, &gps, &queue, MockClock::new(), RecorderConfig::default());

        recorder.toggle().await;
        assert_eq!(state.get(), DeviceState::Tracking);
        assert!(!recorder.request_start("again", 3));
        drop(recorder);
        // The unserved request held the token
        assert_eq!(state.get(), DeviceState::Idle);
    }
}
