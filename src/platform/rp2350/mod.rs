//! RP2350 platform implementation for Raspberry Pi Pico 2 W
//!
//! Concrete implementations of the platform traits on top of `embassy-rp`
//! and `embassy-net`. The e-paper driver and the flash filesystem are
//! board-level components; they plug in through the `Display` and
//! `Storage` traits and are not part of this module.
//!
//! # Feature Gate
//!
//! This module is only available when the `pico2_w` feature is enabled:
//!
//! ```toml
//! [dependencies]
//! trail_mapper = { version = "0.1", default-features = false, features = ["pico2_w"] }
//! ```
//!
//! # Execution contexts
//!
//! Core 0 runs the embassy executor (HTTP server, recorder, buttons, GPS and
//! the offload dispatcher). Core 1 runs [`core1_worker`], which owns the
//! renderer and takes one [`WorkItem`](crate::core::offload::WorkItem) at a
//! time from the [`Core1Context`] hand-off channel.

mod gpio;
mod net;
mod offload;
mod rtc;
mod serial;

pub use gpio::{Indicator, Key};
pub use net::{TcpConnection, TcpServer, TCP_BUFFER_SIZE};
pub use offload::{core1_worker, Core1Context, HandOff, HANDOFF_DEPTH};
pub use rtc::SoftRtc;
pub use serial::UartGps;
