//! Shared access to the GPS session
//!
//! The recorder, HTTP handlers and button actions all want fresh fixes from
//! the one receiver. They go through [`FixSource`], which serializes
//! updates: a handler asking for a 2-cycle update while the recorder is in
//! the middle of its own waits for it to finish.

use super::gps::{FixSample, GpsSession};
use crate::core::traits::Clock;
use crate::platform::traits::{OutputPin, Rtc, SerialPort};
use alloc::string::String;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;

/// Something that can produce fresh fixes
#[allow(async_fn_in_trait)]
pub trait FixSource {
    /// Run `cycles` update cycles and return the resulting fix
    ///
    /// `indicator_on` lights the indicator LED while the update runs.
    async fn refresh(&self, cycles: u32, indicator_on: bool) -> FixSample;

    /// Run `cycles` update cycles and return the diagnostic text
    async fn debug_report(&self, cycles: u32) -> String;
}

/// A [`GpsSession`] behind an async mutex
pub struct SharedGps<P: SerialPort, C: Clock, L: OutputPin> {
    session: Mutex<CriticalSectionRawMutex, GpsSession<P, C, L>>,
}

impl<P: SerialPort, C: Clock, L: OutputPin> SharedGps<P, C, L> {
    pub fn new(session: GpsSession<P, C, L>) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }

    /// See [`GpsSession::initialize`]
    pub async fn initialize<R: Rtc>(&self, rtc: &mut R) {
        self.session.lock().await.initialize(rtc).await;
    }

    /// Last fix without running an update
    pub async fn current(&self) -> FixSample {
        self.session.lock().await.fix()
    }
}

impl<P: SerialPort, C: Clock, L: OutputPin> FixSource for SharedGps<P, C, L> {
    async fn refresh(&self, cycles: u32, indicator_on: bool) -> FixSample {
        let mut session = self.session.lock().await;
        session.update(cycles, indicator_on).await;
        session.fix()
    }

    async fn debug_report(&self, cycles: u32) -> String {
        let mut session = self.session.lock().await;
        session.update(cycles, true).await;
        session.debug_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GpsConfig;
    use crate::core::traits::MockClock;
    use crate::platform::mock::{MockLed, MockSerial};

    const GGA: &str = "GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,";

    #[tokio::test]
    async fn test_concurrent_refreshes_do_not_interleave() {
        let mut serial = MockSerial::new();
        for _ in 0..5 {
            serial.inject_sentences(&[GGA]);
        }
        let clock = MockClock::new();
        let led = MockLed::new();
        let gps = SharedGps::new(
            GpsSession::new(serial, clock.clone(), GpsConfig::default()).with_indicator(led.clone()),
        );

        let (a, b) = tokio::join!(gps.refresh(2, true), gps.debug_report(3));
        assert_eq!(a.satellites, 8);
        assert!(b.contains("satellites used: 8"));
        // 1 s between cycles inside each update, none across updates
        assert_eq!(clock.total_slept_ms(), 3000);
        assert_eq!(led.times_switched_on(), 2);
        assert!(!led.is_on());
    }
}
