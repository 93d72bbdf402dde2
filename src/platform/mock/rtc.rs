//! Mock real-time clock for testing

use crate::platform::{error::RtcError, traits::Rtc};
use chrono::NaiveDateTime;

/// Clock that stores whatever it was last set to
#[derive(Debug, Clone, Default)]
pub struct MockRtc {
    datetime: Option<NaiveDateTime>,
    sets: usize,
}

impl MockRtc {
    /// Create an unset clock
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set_datetime` calls
    pub fn sets(&self) -> usize {
        self.sets
    }
}

impl Rtc for MockRtc {
    fn set_datetime(&mut self, datetime: NaiveDateTime) -> Result<(), RtcError> {
        self.datetime = Some(datetime);
        self.sets += 1;
        Ok(())
    }

    fn now(&mut self) -> Result<NaiveDateTime, RtcError> {
        self.datetime.ok_or(RtcError::NotSet)
    }
}
