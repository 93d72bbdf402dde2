//! Software real-time clock
//!
//! Keeps the date/time set from the first GPS fix and advances it with the
//! embassy monotonic timer.

use crate::platform::error::RtcError;
use crate::platform::traits::Rtc;
use chrono::{NaiveDateTime, TimeDelta};
use embassy_time::Instant;

#[derive(Debug, Default)]
pub struct SoftRtc {
    base: Option<(NaiveDateTime, Instant)>,
}

impl SoftRtc {
    pub const fn new() -> Self {
        Self { base: None }
    }
}

impl Rtc for SoftRtc {
    fn set_datetime(&mut self, datetime: NaiveDateTime) -> Result<(), RtcError> {
        self.base = Some((datetime, Instant::now()));
        Ok(())
    }

    fn now(&mut self) -> Result<NaiveDateTime, RtcError> {
        let (datetime, set_at) = self.base.ok_or(RtcError::NotSet)?;
        let elapsed = i64::try_from(set_at.elapsed().as_millis()).map_err(|_| RtcError::InvalidDateTime)?;
        datetime
            .checked_add_signed(TimeDelta::milliseconds(elapsed))
            .ok_or(RtcError::InvalidDateTime)
    }
}
