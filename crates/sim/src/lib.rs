//! Host simulator for the trail_mapper runtime
//!
//! Provides host-side implementations of the platform traits so the full
//! runtime (recorder, HTTP control surface, offload renderer, buttons) can
//! run on a desktop:
//!
//! - [`DirStorage`]: the track volume as a directory
//! - [`TokioListener`]: HTTP over tokio TCP sockets
//! - [`SimReceiver`]: NMEA replay or a synthetic walk
//! - [`ConsolePanel`]: the e-paper panel as a character grid
//! - [`VirtualKeys`]: the three keys, pressed from stdin

pub mod clock;
pub mod display;
pub mod error;
pub mod gps;
pub mod keys;
pub mod net;
pub mod storage;

pub use clock::{SimRtc, TokioClock};
pub use display::ConsolePanel;
pub use error::SimError;
pub use gps::{SimReceiver, Walker};
pub use keys::{read_keys, VirtualKeys};
pub use net::{TokioConnection, TokioListener};
pub use storage::DirStorage;

#[cfg(test)]
mod test_support {
    use std::path::PathBuf;

    /// Fresh, empty directory under the system temp dir
    pub fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("trail_sim_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
