//! RP2350 UART receive side for the GPS module
//!
//! `embassy_rp::uart::BufferedUartRx` is filled by the UART interrupt. The
//! session polls it without awaiting: [`SerialPort::available`] moves
//! whatever the ring buffer holds into a staging buffer and reports its
//! size, [`SerialPort::read`] copies out of the staging buffer.

use crate::platform::error::SerialError;
use crate::platform::traits::SerialPort;
use embassy_rp::uart::BufferedUartRx;
use embedded_io::{Read, ReadReady};

/// Staging buffer size, a little more than one second of NMEA at 9600 baud
pub const STAGING_SIZE: usize = 1024;

pub struct UartGps {
    rx: BufferedUartRx,
    staged: heapless::Vec<u8, STAGING_SIZE>,
    pos: usize,
    fault: Option<SerialError>,
}

impl UartGps {
    pub fn new(rx: BufferedUartRx) -> Self {
        Self {
            rx,
            staged: heapless::Vec::new(),
            pos: 0,
            fault: None,
        }
    }

    fn fill(&mut self) {
        if self.pos >= self.staged.len() {
            self.staged.clear();
            self.pos = 0;
        }
        let mut chunk = [0u8; 64];
        while self.fault.is_none() && self.staged.len() < STAGING_SIZE {
            match self.rx.read_ready() {
                Ok(true) => {}
                Ok(false) => break,
                Err(_) => {
                    self.fault = Some(SerialError::Overrun);
                    break;
                }
            }
            let room = (STAGING_SIZE - self.staged.len()).min(chunk.len());
            match self.rx.read(&mut chunk[..room]) {
                Ok(0) => break,
                Ok(n) => {
                    // room was checked above
                    let _ = self.staged.extend_from_slice(&chunk[..n]);
                }
                Err(_) => self.fault = Some(SerialError::ReadFailed),
            }
        }
    }
}

impl SerialPort for UartGps {
    fn available(&mut self) -> usize {
        self.fill();
        let pending = self.staged.len() - self.pos;
        if pending == 0 && self.fault.is_some() {
            // Let the next read report the fault
            return 1;
        }
        pending
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        let pending = &self.staged[self.pos..];
        if pending.is_empty() {
            return match self.fault.take() {
                Some(e) => Err(e),
                None => Ok(0),
            };
        }
        let n = pending.len().min(buf.len());
        buf[..n].copy_from_slice(&pending[..n]);
        self.pos += n;
        Ok(n)
    }
}
