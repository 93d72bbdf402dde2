//! Time abstraction traits for platform-agnostic timing operations.
//!
//! This module provides the `Clock` trait that abstracts over different
//! time providers (Embassy, Tokio, mock) so the runtime's sleeps and
//! interval checks can be exercised on the host.

/// Platform-agnostic monotonic clock with async sleep.
///
/// - `EmbassyClock` for the device, backed by `embassy_time`
/// - `MockClock` for host tests, with virtual time that advances on sleep
///
/// # Example
///
/// ```
/// use trail_mapper::core::traits::{Clock, MockClock};
///
/// async fn wait_for_receiver<C: Clock>(clock: &C) -> u64 {
///     let start = clock.now_ms();
///     clock.sleep_ms(1000).await;
///     clock.now_ms() - start
/// }
///
/// let clock = MockClock::new();
/// assert_eq!(embassy_futures::block_on(wait_for_receiver(&clock)), 1000);
/// ```
#[allow(async_fn_in_trait)]
pub trait Clock: Clone {
    /// Milliseconds since system start.
    fn now_ms(&self) -> u64;

    /// Suspend the calling task for `ms` milliseconds.
    async fn sleep_ms(&self, ms: u64);

    /// Milliseconds elapsed since `reference_ms`, saturating at zero.
    fn elapsed_since(&self, reference_ms: u64) -> u64 {
        self.now_ms().saturating_sub(reference_ms)
    }
}

// ============================================================================
// Embassy Implementation
// ============================================================================

/// Device clock backed by the embassy time driver.
#[cfg(feature = "embassy")]
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

#[cfg(feature = "embassy")]
impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }

    async fn sleep_ms(&self, ms: u64) {
        embassy_time::Timer::after_millis(ms).await;
    }
}

// ============================================================================
// Mock Implementation
// ============================================================================

#[cfg(any(test, feature = "std"))]
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Mock clock with virtual time for deterministic tests.
///
/// `sleep_ms` advances the shared virtual time by the requested amount and
/// yields to the executor once, so concurrent tasks interleave without any
/// real waiting. Clones share the same time.
///
/// # Example
///
/// ```
/// use trail_mapper::core::traits::{Clock, MockClock};
///
/// let clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(1500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[cfg(any(test, feature = "std"))]
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    now_ms: Arc<AtomicU64>,
    slept_ms: Arc<AtomicU64>,
}

#[cfg(any(test, feature = "std"))]
impl MockClock {
    /// Creates a new `MockClock` starting at time 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the current time by the specified amount.
    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Total time requested through `sleep_ms` across all clones.
    pub fn total_slept_ms(&self) -> u64 {
        self.slept_ms.load(Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "std"))]
impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    async fn sleep_ms(&self, ms: u64) {
        self.advance(ms);
        self.slept_ms.fetch_add(ms, Ordering::SeqCst);
        embassy_futures::yield_now().await;
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock_advances_on_sleep() {
        let clock = MockClock::new();
        embassy_futures::block_on(clock.sleep_ms(250));
        assert_eq!(clock.now_ms(), 250);
        assert_eq!(clock.total_slept_ms(), 250);
    }

    #[test]
    fn test_clones_share_time() {
        let clock = MockClock::new();
        let other = clock.clone();
        other.advance(40);
        assert_eq!(clock.now_ms(), 40);
        assert_eq!(clock.elapsed_since(10), 30);
        assert_eq!(clock.elapsed_since(100), 0);
    }
}
