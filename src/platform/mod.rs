//! Platform abstraction layer
//!
//! Hardware access is isolated behind the traits in [`traits`]. Device code
//! lives in `rp2350` (Pico 2 W), host-side execution contexts in `host`, and
//! in-memory doubles for tests in `mock`.

pub mod error;
pub mod traits;

// Platform implementations (feature-gated)
#[cfg(feature = "pico2_w")]
pub mod rp2350;

#[cfg(any(test, feature = "std"))]
pub mod host;

#[cfg(any(test, feature = "std"))]
pub mod mock;

// Re-export commonly used types
pub use error::{
    DisplayError, NetError, PlatformError, Result, RtcError, SerialError, StorageError,
};
pub use traits::{
    Connection, Display, File, InputPin, Listener, OpenMode, OutputPin, Rtc, SerialPort, Storage,
};
