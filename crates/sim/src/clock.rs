//! Host time sources

use chrono::{NaiveDateTime, TimeDelta};
use std::time::Instant;
use trail_mapper::core::traits::Clock;
use trail_mapper::platform::error::RtcError;
use trail_mapper::platform::traits::Rtc;

/// Monotonic clock on the tokio timer
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            start: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    async fn sleep_ms(&self, ms: u64) {
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    }
}

/// Wall clock set from the first GPS fix
#[derive(Debug, Clone, Default)]
pub struct SimRtc {
    base: Option<(NaiveDateTime, Instant)>,
}

impl SimRtc {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Rtc for SimRtc {
    fn set_datetime(&mut self, datetime: NaiveDateTime) -> Result<(), RtcError> {
        self.base = Some((datetime, Instant::now()));
        Ok(())
    }

    fn now(&mut self) -> Result<NaiveDateTime, RtcError> {
        let (datetime, set_at) = self.base.ok_or(RtcError::NotSet)?;
        let elapsed = TimeDelta::from_std(set_at.elapsed()).map_err(|_| RtcError::InvalidDateTime)?;
        datetime
            .checked_add_signed(elapsed)
            .ok_or(RtcError::InvalidDateTime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_rtc_runs_from_the_set_time() {
        let mut rtc = SimRtc::new();
        assert_eq!(rtc.now(), Err(RtcError::NotSet));
        let set = NaiveDate::from_ymd_opt(2024, 3, 23)
            .and_then(|d| d.and_hms_opt(12, 35, 19))
            .unwrap();
        rtc.set_datetime(set).unwrap();
        let now = rtc.now().unwrap();
        assert!(now >= set);
        assert!(now - set < TimeDelta::seconds(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_follows_tokio_time() {
        let clock = TokioClock::new();
        clock.sleep_ms(1500).await;
        assert_eq!(clock.now_ms(), 1500);
    }
}
