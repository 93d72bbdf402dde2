//! Serial port interface trait
//!
//! The GPS receiver streams NMEA sentences once per second. Reads are
//! non-blocking: callers check [`SerialPort::available`] and back off with a
//! timed sleep when nothing has arrived.

use crate::platform::error::SerialError;

/// Non-blocking receive side of a UART
pub trait SerialPort {
    /// Number of bytes waiting in the receive buffer (0 if none)
    fn available(&mut self) -> usize;

    /// Read buffered bytes without waiting
    ///
    /// Returns the number of bytes copied into `buf`, which may be 0.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError>;
}
