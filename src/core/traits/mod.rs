//! Core abstraction traits for platform-agnostic runtime code.

pub mod time;

pub use time::Clock;
#[cfg(feature = "embassy")]
pub use time::EmbassyClock;
#[cfg(any(test, feature = "std"))]
pub use time::MockClock;
