//! Trail mapper on the host
//!
//! Runs the device runtime against a directory volume, a simulated GPS
//! receiver and a terminal panel. The control page is served over HTTP and
//! the three keys are pressed by typing `1`, `2`, `3` (or `1l`... for a long
//! press) on stdin.
//!
//! Usage:
//!   cargo run -p trail_mapper_sim --bin trail_sim -- [OPTIONS]

use chrono::Utc;
use clap::Parser;
use embassy_futures::select::{select, select4};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use trail_mapper::app::{routes, TrailApp};
use trail_mapper::config::{HttpConfig, RuntimeConfig};
use trail_mapper::core::file_lock::FileLock;
use trail_mapper::core::offload::{Dispatcher, OffloadQueue, ReadinessSignal};
use trail_mapper::core::state::DEVICE_STATE;
use trail_mapper::devices::buttons::ButtonListener;
use trail_mapper::devices::{GpsSession, SharedGps};
use trail_mapper::display::{RenderJob, Renderer};
use trail_mapper::http::HttpServer;
use trail_mapper::platform::host::ThreadContext;
use trail_mapper::recorder::TrailRecorder;
use trail_mapper_sim::{
    read_keys, ConsolePanel, DirStorage, SimError, SimReceiver, SimRtc, TokioClock, TokioListener,
    VirtualKeys, Walker,
};

/// One sentence group per second, like the receiver
const NMEA_PACING: Duration = Duration::from_secs(1);

static OFFLOAD_READY: ReadinessSignal = ReadinessSignal::new();

#[derive(Parser, Debug)]
#[command(name = "trail_sim", version, about = "Run the trail mapper runtime on the host", long_about = None)]
struct Args {
    /// Directory holding track logs, indices and config.json
    #[arg(short, long, default_value = "trail_data")]
    data_dir: PathBuf,

    /// HTTP port (overrides config.json)
    #[arg(short, long)]
    port: Option<u16>,

    /// Replay a recorded NMEA log instead of the synthetic walk
    #[arg(long, value_name = "FILE")]
    nmea: Option<PathBuf>,

    /// Latitude the synthetic walk starts from
    #[arg(long, default_value_t = 40.0, allow_negative_numbers = true)]
    start_lat: f64,

    /// Longitude the synthetic walk starts from
    #[arg(long, default_value_t = -75.0, allow_negative_numbers = true)]
    start_lon: f64,

    /// Walking speed in m/s
    #[arg(long, default_value_t = 1.4)]
    speed: f64,

    /// Panel refresh time in milliseconds
    #[arg(long, default_value_t = 2000)]
    refresh_ms: u64,

    #[arg(long, default_value_t = 264)]
    panel_width: u16,

    #[arg(long, default_value_t = 176)]
    panel_height: u16,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            trail_mapper::log_error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), SimError> {
    std::fs::create_dir_all(&args.data_dir).map_err(|_| SimError::DataDir(args.data_dir.clone()))?;
    let files = FileLock::new(DirStorage::new(&args.data_dir));
    let config = RuntimeConfig::load(&files).await;
    let clock = TokioClock::new();

    let serial = match &args.nmea {
        Some(path) => SimReceiver::replay_file(path, NMEA_PACING)?,
        None => SimReceiver::walk(
            Walker::new(args.start_lat, args.start_lon, args.speed, Utc::now().naive_utc()),
            NMEA_PACING,
        ),
    };
    let gps = SharedGps::new(GpsSession::new(serial, clock, config.gps.clone()));

    let panel_size = (args.panel_width, args.panel_height);
    let panel = ConsolePanel::new(panel_size.0, panel_size.1)
        .with_refresh_delay(Duration::from_millis(args.refresh_ms));
    let queue: OffloadQueue<RenderJob> = OffloadQueue::new();
    let context = ThreadContext::spawn(Renderer::new(panel), &OFFLOAD_READY);
    let mut dispatcher = Dispatcher::new(&queue, &OFFLOAD_READY, context, clock, config.offload.timing());

    let recorder = TrailRecorder::new(&DEVICE_STATE, &files, &gps, &queue, clock, config.recorder.clone())
        .with_map(panel_size, config.reader.chunk_lines);
    let app = TrailApp::new(&files, &gps, &recorder, &queue);

    let http = HttpConfig {
        port: args.port.unwrap_or(config.http.port),
        ..config.http.clone()
    };
    let port = http.port;
    let mut listener = TokioListener::bind(&format!("0.0.0.0:{}", port))
        .await
        .map_err(|source| SimError::Bind { port, source })?;
    let table = routes().map_err(|e| SimError::Routes(e.to_string()))?;
    let server = HttpServer::new(table, &files, http);

    let keys = VirtualKeys::new();
    let mut buttons = ButtonListener::new(keys.pins(), clock, &config.buttons);

    trail_mapper::log_info!("Data directory: {}", args.data_dir.display());
    trail_mapper::log_info!("Waiting for GPS fix...");
    gps.initialize(&mut SimRtc::new()).await;
    trail_mapper::log_info!("Control page at http://127.0.0.1:{}/", port);
    trail_mapper::log_info!("Keys: 1, 2, 3 (short) or 1l, 2l, 3l (long), then Enter");

    let runtime = select4(
        server.run(&mut listener, &app),
        recorder.run(),
        dispatcher.run(),
        app.run_buttons(&mut buttons, &config.buttons.map),
    );
    select(runtime, read_keys(keys.clone(), config.buttons.clone())).await;
    Ok(())
}
