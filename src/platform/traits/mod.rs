//! Platform abstraction traits
//!
//! This module defines the traits that platform implementations must provide.

pub mod display;
pub mod gpio;
pub mod net;
pub mod rtc;
pub mod serial;
pub mod storage;

// Re-export trait interfaces
pub use display::{Display, Point};
pub use gpio::{InputPin, NoIndicator, OutputPin};
pub use net::{Connection, Listener};
pub use rtc::Rtc;
pub use serial::SerialPort;
pub use storage::{File, OpenMode, Storage};
