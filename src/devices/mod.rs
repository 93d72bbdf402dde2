//! Device drivers
//!
//! Drivers written against the platform traits, so they run unchanged on
//! the device, in the simulator and under test.
//!
//! ## Modules
//!
//! - `gps`: GPS session (NMEA read/parse/retry, fix-loss handling)
//! - `fix_source`: shared, serialized access to the GPS session
//! - `buttons`: key polling and press classification

pub mod buttons;
pub mod fix_source;
pub mod gps;

pub use fix_source::{FixSource, SharedGps};
pub use gps::{FixSample, GpsSession, UpdateReport};
