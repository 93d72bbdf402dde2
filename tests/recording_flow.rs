//! End-to-end recording flow on the host
//!
//! A scripted GPS receiver, the in-memory volume and mock sockets stand in
//! for the hardware; everything else is the production runtime: HTTP
//! handlers, the recorder task, trail map planning, the offload dispatcher
//! and the renderer on its worker thread.

use embassy_futures::select::select;
use serial_test::serial;
use trail_mapper::app::{routes, Endpoint, TrailApp};
use trail_mapper::config::{GpsConfig, HttpConfig, RecorderConfig};
use trail_mapper::core::file_lock::FileLock;
use trail_mapper::core::offload::{DispatchTiming, Dispatcher, OffloadQueue, ReadinessSignal};
use trail_mapper::core::state::{DeviceState, DeviceStateCell, DEVICE_STATE};
use trail_mapper::devices::{GpsSession, SharedGps};
use trail_mapper::display::{RenderJob, Renderer};
use trail_mapper::http::{HttpServer, Service};
use trail_mapper::platform::host::ThreadContext;
use trail_mapper::recorder::TrailRecorder;
use trail_mapper::platform::mock::{
    nmea_frame, DrawOp, MockClock, MockConnection, MockDisplay, MockRtc, MockSerial, MockStorage,
};
use trail_mapper::tracks::index::{self, TRACK_INDEX_PATH};
use trail_mapper::tracks::{ChunkedTrackReader, TrackIndex, DEFAULT_CHUNK_LINES, TRACK_HEADER};

const GGA: &str = "GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,";
const RMC: &str = "GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230324,003.1,W";

/// 2024-03-23 12:35:19 UTC
const FIX_TIME: i64 = 1_711_197_319;

fn receiver() -> MockSerial {
    let mut burst = nmea_frame(GGA);
    burst.extend_from_slice(&nmea_frame(RMC));
    MockSerial::looping(vec![burst])
}

fn rows(storage: &MockStorage, path: &str) -> usize {
    storage
        .text(path)
        .map_or(0, |text| text.lines().count().saturating_sub(1))
}

async fn exchange<V>(server: &HttpServer<'_, MockStorage, Endpoint>, app: &V, raw: &[u8]) -> String
where
    V: Service<Endpoint = Endpoint>,
{
    let mut conn = MockConnection::with_request(raw);
    let probe = conn.probe();
    server
        .serve_connection(&mut conn, app)
        .await
        .expect("request served");
    assert!(probe.is_closed());
    probe.written_text()
}

#[tokio::test]
#[serial]
async fn test_record_stop_and_render_over_http() {
    assert_eq!(DEVICE_STATE.get(), DeviceState::Idle);

    let storage = MockStorage::new();
    let files = FileLock::new(storage.clone());
    let clock = MockClock::new();
    let gps = SharedGps::new(GpsSession::new(receiver(), clock.clone(), GpsConfig::default()));
    let mut rtc = MockRtc::new();
    gps.initialize(&mut rtc).await;
    assert_eq!(rtc.sets(), 1);

    let queue: OffloadQueue<RenderJob> = OffloadQueue::new();
    let recorder = TrailRecorder::new(
        &DEVICE_STATE,
        &files,
        &gps,
        &queue,
        clock.clone(),
        RecorderConfig::default(),
    );
    let app = TrailApp::new(&files, &gps, &recorder, &queue);
    let server = HttpServer::new(routes().unwrap(), &files, HttpConfig::default());
    let path = format!("tracks/TMC_test_{}.csv", FIX_TIME);

    let driver = async {
        let reply = exchange(&server, &app, b"POST /track HTTP/1.0\r\n\r\nfilename=test&").await;
        assert!(reply.starts_with("HTTP/1.0 303 See Other\r\n"));
        assert_eq!(DEVICE_STATE.get(), DeviceState::Tracking);

        while rows(&storage, &path) < 2 {
            embassy_futures::yield_now().await;
        }

        let reply = exchange(&server, &app, b"POST /track HTTP/1.0\r\n\r\nstop=1").await;
        assert!(reply.starts_with("HTTP/1.0 303 See Other\r\n"));
    };
    select(recorder.run(), driver).await;

    assert_eq!(DEVICE_STATE.get(), DeviceState::Idle);
    assert!(!files.is_locked());
    assert_eq!(storage.open_handles(), 0);

    let text = storage.text(&path).unwrap();
    assert!(text.starts_with(TRACK_HEADER));
    assert!(rows(&storage, &path) >= 2);
    for row in text.lines().skip(1) {
        assert!(row.starts_with("1711197319,48.11"), "unexpected row {row}");
        assert!(row.ends_with(",8,0.9"), "unexpected row {row}");
    }

    let tracks: TrackIndex = index::load(&files, TRACK_INDEX_PATH).await.unwrap();
    assert_eq!(tracks[&path].description, "test");
    assert_eq!(tracks[&path].start_time, FIX_TIME);
    assert_eq!(tracks[&path].width, RecorderConfig::default().default_width);

    let home = exchange(&server, &app, b"GET / HTTP/1.0\r\n\r\n").await;
    assert!(home.contains("State: IDLE"));

    // Stopping queued the trail map; render it on the worker thread
    assert!(!queue.is_empty());
    let display = MockDisplay::new(264, 176);
    let ready: &'static ReadinessSignal = Box::leak(Box::new(ReadinessSignal::new()));
    let context = ThreadContext::spawn(Renderer::new(display.clone()), ready);
    let timing = DispatchTiming {
        idle_poll_ms: 0,
        settle_ms: 0,
    };
    let mut dispatcher = Dispatcher::new(&queue, ready, context, clock.clone(), timing);
    while dispatcher.dispatch_next().await {}
    dispatcher.wait_idle().await;

    assert!(queue.is_empty());
    let ops = display.ops();
    assert!(ops.iter().any(|op| matches!(op, DrawOp::Line(..))));
    assert_eq!(ops.last(), Some(&DrawOp::Refresh));
}

#[tokio::test]
async fn test_location_and_download_of_recorded_track() {
    let state = DeviceStateCell::new();
    let storage = MockStorage::new();
    let files = FileLock::new(storage.clone());
    let clock = MockClock::new();
    let gps = SharedGps::new(GpsSession::new(receiver(), clock.clone(), GpsConfig::default()));
    gps.initialize(&mut MockRtc::new()).await;

    let queue: OffloadQueue<RenderJob> = OffloadQueue::new();
    let recorder = TrailRecorder::new(&state, &files, &gps, &queue, clock, RecorderConfig::default());
    let app = TrailApp::new(&files, &gps, &recorder, &queue);
    let server = HttpServer::new(routes().unwrap(), &files, HttpConfig::default());

    let location = exchange(&server, &app, b"GET /loc HTTP/1.0\r\n\r\n").await;
    assert!(location.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(location.contains("https://www.google.com/maps/search/48.11"));

    let recorded = format!("{}\n1711197319,48.1173,11.5166,8,0.9\n", TRACK_HEADER);
    storage.insert_file("tracks/TMC_walk_1711197319.csv", recorded.as_bytes());
    let points = ChunkedTrackReader::open(&files, "tracks/TMC_walk_1711197319.csv", DEFAULT_CHUNK_LINES)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].latitude, 48.1173);
    let download = exchange(
        &server,
        &app,
        b"GET /download?filename=tracks%2FTMC_walk_1711197319.csv HTTP/1.0\r\n\r\n",
    )
    .await;
    assert!(download.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(download.ends_with(&recorded));

    let missing = exchange(
        &server,
        &app,
        b"GET /download?filename=tracks/TMC_gone_1.csv HTTP/1.0\r\n\r\n",
    )
    .await;
    assert!(missing.starts_with("HTTP/1.0 404 Not Found\r\n"));
}
