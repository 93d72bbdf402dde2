//! Real-time clock interface trait

use crate::platform::error::RtcError;
use chrono::NaiveDateTime;

/// Wall-clock time source, set once from the first GPS fix
pub trait Rtc {
    /// Set the clock to a UTC date/time
    fn set_datetime(&mut self, datetime: NaiveDateTime) -> Result<(), RtcError>;

    /// Current UTC date/time
    fn now(&mut self) -> Result<NaiveDateTime, RtcError>;
}
