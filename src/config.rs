//! Runtime configuration
//!
//! Every timing and sizing constant of the runtime, grouped per component.
//! The values are read once at boot from `config.json` on the device volume:
//!
//! ```json
//! { "gps": { "cycle_interval_ms": 1000 }, "recorder": { "log_interval_ms": 5000 } }
//! ```
//!
//! Missing groups and fields keep their defaults. A missing file yields the
//! defaults; a malformed file is logged and ignored.

use crate::core::file_lock::FileLock;
use crate::core::offload::DispatchTiming;
use crate::devices::buttons::ButtonMap;
use crate::platform::error::StorageError;
use crate::platform::traits::Storage;
use alloc::string::String;
use serde::{Deserialize, Serialize};

/// Configuration file on the device volume
pub const CONFIG_PATH: &str = "config.json";

/// GPS session timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsConfig {
    /// Back-off when the receiver has sent nothing yet
    pub no_data_retry_ms: u64,
    /// Pause between read cycles, matching the receiver's output rate
    pub cycle_interval_ms: u64,
    /// Pause between attempts while waiting for the first fix
    pub init_retry_ms: u64,
    /// Cycles of the settle update after the first fix
    pub settle_cycles: u32,
    /// A fix older than this counts as lost
    pub fix_stale_ms: u64,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            no_data_retry_ms: 100,
            cycle_interval_ms: 1000,
            init_retry_ms: 1100,
            settle_cycles: 3,
            fix_stale_ms: 5000,
        }
    }
}

/// Offload dispatch pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffloadConfig {
    pub idle_poll_ms: u64,
    pub settle_ms: u64,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        let timing = DispatchTiming::default();
        Self {
            idle_poll_ms: timing.idle_poll_ms,
            settle_ms: timing.settle_ms,
        }
    }
}

impl OffloadConfig {
    pub fn timing(&self) -> DispatchTiming {
        DispatchTiming {
            idle_poll_ms: self.idle_poll_ms,
            settle_ms: self.settle_ms,
        }
    }
}

/// HTTP server sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
    /// Per-read timeout; a timeout ends the request
    pub read_timeout_ms: u64,
    /// Bytes requested per socket read
    pub read_chunk: usize,
    /// Bytes per lock hold when streaming a file
    pub file_chunk: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 80,
            read_timeout_ms: 500,
            read_chunk: 4096,
            file_chunk: 512,
        }
    }
}

/// Recording loop timing and defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Pause between log rows
    pub log_interval_ms: u64,
    /// Minimum time between status renders while recording
    pub render_interval_ms: u64,
    /// GPS cycles run before the log file is named
    pub settle_cycles: u32,
    /// Poll period while waiting for the loop to stop
    pub stop_poll_ms: u64,
    /// Stroke width stored for new tracks
    pub default_width: u8,
    /// Description used for button-started recordings
    pub default_description: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            log_interval_ms: 2000,
            render_interval_ms: 60_000,
            settle_cycles: 3,
            stop_poll_ms: 100,
            default_width: 3,
            default_description: String::from("trail"),
        }
    }
}

/// Button sampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonConfig {
    pub poll_interval_ms: u64,
    /// A button still held after this long is a long press
    pub hold_ms: u64,
    /// Action per key and press length
    pub map: ButtonMap,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            hold_ms: 1000,
            map: ButtonMap::default(),
        }
    }
}

/// Track reader sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Lines read per lock hold
    pub chunk_lines: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            chunk_lines: crate::tracks::DEFAULT_CHUNK_LINES,
        }
    }
}

/// All runtime tunables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub gps: GpsConfig,
    pub offload: OffloadConfig,
    pub http: HttpConfig,
    pub recorder: RecorderConfig,
    pub buttons: ButtonConfig,
    pub reader: ReaderConfig,
}

impl RuntimeConfig {
    /// Parse a configuration document
    pub fn from_json(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice(bytes).ok()
    }

    /// Load `config.json`, falling back to the defaults
    pub async fn load<S: Storage>(files: &FileLock<S>) -> Self {
        let content = {
            let guard = files.exclusive().await;
            guard.read(CONFIG_PATH)
        };
        match content {
            Ok(bytes) => match Self::from_json(&bytes) {
                Some(config) => {
                    crate::log_info!("Loaded {}", CONFIG_PATH);
                    config
                }
                None => {
                    crate::log_warn!("{} is malformed, using defaults", CONFIG_PATH);
                    Self::default()
                }
            },
            Err(StorageError::NotFound) => Self::default(),
            Err(e) => {
                crate::log_warn!("Failed to read {}: {}", CONFIG_PATH, e);
                Self::default()
            }
        }
    }
}
