//! Mock platform implementation for testing
//!
//! In-memory doubles for every platform trait so the runtime can be
//! exercised on the host without hardware.
//!
//! # Feature Gate
//!
//! This module is available in two contexts:
//! - During test builds (`#[cfg(test)]`)
//! - When the `std` feature is enabled

#![cfg(any(test, feature = "std"))]

mod display;
mod gpio;
mod net;
mod rtc;
mod serial;
mod storage;

pub use display::{DrawOp, MockDisplay};
pub use gpio::{MockButton, MockLed};
pub use net::{MockConnection, MockListener, MockProbe, ReadStep};
pub use rtc::MockRtc;
pub use serial::{nmea_frame, MockSerial};
pub use storage::{MockFile, MockStorage};

pub use crate::core::traits::time::MockClock;
