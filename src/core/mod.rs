//! Core runtime primitives
//!
//! - `logging`: level-tagged log macros for device and host
//! - `file_lock`: the single lock serializing every filesystem access
//! - `offload`: work queue feeding the second execution context
//! - `state`: the process-wide device state machine cell
//! - `traits`: time abstraction shared by all async components

pub mod file_lock;
pub mod logging;
pub mod offload;
pub mod state;
pub mod traits;
