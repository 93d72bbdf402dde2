//! Host (std) platform pieces
//!
//! Only the second execution context lives here; host storage, network and
//! serial implementations belong to the simulator crate.

mod offload;

pub use offload::ThreadContext;
