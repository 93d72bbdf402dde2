//! Device application: HTTP handlers and button actions
//!
//! | Route              | Method | Effect                                      |
//! |--------------------|--------|---------------------------------------------|
//! | `/`                | GET    | state and controls                          |
//! | `/track`           | POST   | `filename=<desc>` starts, `stop` stops      |
//! | `/download`        | GET    | `?filename=` track log or index, streamed   |
//! | `/view_tracks`     | GET    | recorded tracks                             |
//! | `/loc`             | GET    | current position (2 GPS cycles)             |
//! | `/debug`           | GET    | GPS diagnostics (3 GPS cycles)              |
//! | `/marker`          | POST   | `text=` marker at the current position      |
//! | `/junction`        | POST   | junction at the current position            |
//! | `/upload`          | POST   | `?filename=` store the raw body             |
//! | `/display`         | POST   | show recorded trails on the panel           |

pub mod pages;

use crate::core::file_lock::FileLock;
use crate::core::offload::{OffloadQueue, RunMode};
use crate::core::traits::Clock;
use crate::devices::buttons::{ButtonAction, ButtonListener, ButtonMap};
use crate::devices::fix_source::FixSource;
use crate::display::RenderJob;
use crate::http::response::{JSON, TEXT};
use crate::http::{url_decode, Request, Response, RouteError, RouteTable, Service};
use crate::platform::error::StorageError;
use crate::platform::traits::{File, InputPin, OpenMode, Storage};
use crate::recorder::TrailRecorder;
use crate::tracks::index::{
    self, Junction, Marker, TrackIndex, JUNCTION_INDEX_PATH, MARKER_INDEX_PATH, TRACK_INDEX_PATH,
};
use crate::tracks::log::{is_track_path, TRACK_DIR};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

/// Request handlers of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Endpoint {
    Home,
    Track,
    Download,
    ViewTracks,
    Location,
    Debug,
    Marker,
    Junction,
    Upload,
    Display,
}

/// GPS cycles run before answering `/loc`
const LOCATION_CYCLES: u32 = 2;
/// GPS cycles run before answering `/debug` or showing debug text
const DEBUG_CYCLES: u32 = 3;

/// The device route table
pub fn routes() -> Result<RouteTable<Endpoint>, RouteError> {
    let mut routes = RouteTable::new();
    routes.add("/", "GET", Endpoint::Home)?;
    routes.add("/track", "POST", Endpoint::Track)?;
    routes.add("/download", "GET", Endpoint::Download)?;
    routes.add("/view_tracks", "GET", Endpoint::ViewTracks)?;
    routes.add("/loc", "GET", Endpoint::Location)?;
    routes.add("/debug", "GET", Endpoint::Debug)?;
    routes.add("/marker", "POST", Endpoint::Marker)?;
    routes.add("/junction", "POST", Endpoint::Junction)?;
    routes.add("/upload", "POST", Endpoint::Upload)?;
    routes.add("/display", "POST", Endpoint::Display)?;
    Ok(routes)
}

/// Whether `path` may be downloaded
pub fn is_downloadable(path: &str) -> bool {
    is_track_path(path) || [TRACK_INDEX_PATH, MARKER_INDEX_PATH, JUNCTION_INDEX_PATH].contains(&path)
}

/// Whether `name` may be written by `/upload` (a plain root-level name)
fn is_upload_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.ends_with(".tmp")
        && !name.contains('/')
        && !name.contains('\\')
}

/// Handlers and button actions, sharing the runtime's components
pub struct TrailApp<'a, 'r, S: Storage, G: FixSource, C: Clock> {
    files: &'a FileLock<S>,
    gps: &'a G,
    recorder: &'a TrailRecorder<'r, S, G, C>,
    queue: &'a OffloadQueue<RenderJob>,
}

impl<'a, 'r, S: Storage, G: FixSource, C: Clock> TrailApp<'a, 'r, S, G, C> {
    pub fn new(
        files: &'a FileLock<S>,
        gps: &'a G,
        recorder: &'a TrailRecorder<'r, S, G, C>,
        queue: &'a OffloadQueue<RenderJob>,
    ) -> Self {
        Self {
            files,
            gps,
            recorder,
            queue,
        }
    }

    async fn track(&self, request: &Request) -> Response {
        let form = request.form();
        if form.contains_key("stop") {
            self.recorder.stop().await;
        } else if let Some(name) = form.get("filename") {
            let description = url_decode(name);
            let width = form
                .get("width")
                .and_then(|w| w.parse::<u8>().ok())
                .filter(|w| *w > 0)
                .unwrap_or(self.recorder.config().default_width);
            if !self.recorder.request_start(&description, width) {
                crate::log_info!("Ignoring start while {}", self.recorder.state());
            }
        } else {
            return Response::bad_request("expected filename or stop");
        }
        Response::redirect("/")
    }

    async fn download(&self, request: &Request) -> Response {
        let Some(path) = request.arg("filename").map(url_decode) else {
            return Response::not_found();
        };
        if !is_downloadable(&path) {
            crate::log_warn!("Refusing download of {}", path);
            return Response::not_found();
        }
        let len = match self.files.open(&path, OpenMode::Read).await {
            Ok(mut file) => file.len(),
            Err(e) => Err(e),
        };
        match len {
            Ok(len) => {
                let content_type = if path.ends_with(".json") { JSON } else { TEXT };
                let name = path.rsplit('/').next().unwrap_or(path.as_str());
                let disposition = format!("attachment; filename=\"{}\"", name);
                Response::file(&path, len, content_type).with_header("Content-Disposition", &disposition)
            }
            Err(StorageError::NotFound) => Response::not_found(),
            Err(e) => {
                crate::log_error!("Cannot read {}: {}", path, e);
                Response::not_found()
            }
        }
    }

    async fn view_tracks(&self) -> Response {
        let paths = {
            let guard = self.files.exclusive().await;
            guard.list(TRACK_DIR)
        };
        let mut paths: Vec<String> = match paths {
            Ok(paths) => paths.into_iter().filter(|p| is_track_path(p)).collect(),
            Err(StorageError::NotFound) => Vec::new(),
            Err(e) => {
                crate::log_error!("Cannot list tracks: {}", e);
                Vec::new()
            }
        };
        paths.sort();
        let index: TrackIndex = match index::load(self.files, TRACK_INDEX_PATH).await {
            Ok(index) => index,
            Err(e) => {
                crate::log_warn!("{}", e);
                TrackIndex::new()
            }
        };
        Response::html(pages::track_list(
            paths.iter().map(|p| (p.as_str(), index.get(p))),
        ))
    }

    async fn marker(&self, request: &Request) -> Response {
        let text = request
            .form()
            .get("text")
            .map(|t| url_decode(t))
            .unwrap_or_default();
        let fix = self.gps.refresh(1, false).await;
        let marker = Marker {
            lat: fix.latitude,
            long: fix.longitude,
            text,
            time: fix.timestamp_utc,
        };
        match index::add_marker(self.files, marker).await {
            Ok(count) => crate::log_info!("Marker {} added", count),
            Err(e) => crate::log_error!("Cannot add marker: {}", e),
        }
        Response::redirect("/")
    }

    async fn junction(&self) -> Response {
        let fix = self.gps.refresh(1, false).await;
        let junction = Junction {
            lat: fix.latitude,
            long: fix.longitude,
            time: fix.timestamp_utc,
        };
        match index::add_junction(self.files, junction).await {
            Ok(count) => crate::log_info!("Junction {} added", count),
            Err(e) => crate::log_error!("Cannot add junction: {}", e),
        }
        Response::redirect("/")
    }

    async fn upload(&self, request: &Request) -> Response {
        let Some(name) = request.arg("filename").map(url_decode) else {
            return Response::bad_request("missing filename");
        };
        if !is_upload_name(&name) {
            return Response::bad_request("invalid filename");
        }
        let data = request.body.as_bytes();
        let result = {
            let guard = self.files.exclusive().await;
            guard.write_atomic(&name, data)
        };
        match result {
            Ok(()) => {
                crate::log_info!("Stored {} ({} bytes)", name, data.len());
                Response::text(format!("stored {} bytes as {}", data.len(), name))
            }
            Err(e) => {
                crate::log_error!("Cannot store {}: {}", name, e);
                Response::bad_request("storage error")
            }
        }
    }

    /// Run the action bound to a button press
    pub async fn perform(&self, action: ButtonAction) {
        crate::log_debug!("Button action: {:?}", action);
        match action {
            ButtonAction::ToggleRecording => self.recorder.toggle().await,
            ButtonAction::DisplayTrails => self.recorder.show_trails().await,
            ButtonAction::DisplayStatus => {
                let fix = self.gps.refresh(1, true).await;
                let text = format!(
                    "{}\nlat: {}\nlong: {}\nsats: {}  pdop: {}",
                    self.recorder.state(),
                    fix.latitude,
                    fix.longitude,
                    fix.satellites,
                    fix.pdop
                );
                self.queue.enqueue(RenderJob::Text(text), RunMode::Sync, true);
            }
            ButtonAction::DisplayGpsDebug => {
                let report = self.gps.debug_report(DEBUG_CYCLES).await;
                self.queue.enqueue(RenderJob::GpsDebug(report), RunMode::Sync, true);
            }
            ButtonAction::ClearDisplay => self.queue.enqueue(RenderJob::Clear, RunMode::Sync, true),
            ButtonAction::None => {}
        }
    }

    /// Button task: map presses to actions forever
    pub async fn run_buttons<B: InputPin, K: Clock>(
        &self,
        listener: &mut ButtonListener<B, K>,
        map: &ButtonMap,
    ) -> ! {
        loop {
            let (key, press) = listener.next_press().await;
            crate::log_info!("Key {} pressed ({:?})", key, press);
            self.perform(map.action(key, press)).await;
        }
    }
}

impl<S: Storage, G: FixSource, C: Clock> Service for TrailApp<'_, '_, S, G, C> {
    type Endpoint = Endpoint;

    async fn call(&self, endpoint: Endpoint, request: &Request) -> Response {
        match endpoint {
            Endpoint::Home => Response::html(pages::home(self.recorder.state())),
            Endpoint::Track => self.track(request).await,
            Endpoint::Download => self.download(request).await,
            Endpoint::ViewTracks => self.view_tracks().await,
            Endpoint::Location => {
                let fix = self.gps.refresh(LOCATION_CYCLES, true).await;
                Response::html(pages::location(&fix))
            }
            Endpoint::Debug => {
                let report = self.gps.debug_report(DEBUG_CYCLES).await;
                Response::html(pages::debug(&report))
            }
            Endpoint::Marker => self.marker(request).await,
            Endpoint::Junction => self.junction().await,
            Endpoint::Upload => self.upload(request).await,
            Endpoint::Display => {
                self.recorder.show_trails().await;
                Response::redirect("/")
            }
        }
    }
}
