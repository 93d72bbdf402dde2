//! Mock serial port for testing

use crate::platform::{error::SerialError, traits::SerialPort};
use std::collections::VecDeque;
use std::format;
use std::vec::Vec;

/// Frame an NMEA sentence body with `$`, checksum and CRLF
///
/// ```
/// use trail_mapper::platform::mock::nmea_frame;
///
/// let frame = nmea_frame("GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,");
/// assert!(frame.ends_with(b"*47\r\n"));
/// ```
pub fn nmea_frame(body: &str) -> Vec<u8> {
    let checksum = body.bytes().fold(0u8, |acc, b| acc ^ b);
    format!("${}*{:02X}\r\n", body, checksum).into_bytes()
}

/// Mock serial port
///
/// Data is delivered in bursts, one burst per read cycle, the way a GPS
/// receiver emits its sentence group once per second. A looping port
/// replays its bursts forever.
#[derive(Debug, Default)]
pub struct MockSerial {
    queued: VecDeque<Vec<u8>>,
    looped: Vec<Vec<u8>>,
    next_loop: usize,
    current: Vec<u8>,
    bursts_served: usize,
    fail_reads: usize,
}

impl MockSerial {
    /// Create a port with nothing queued
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a port that cycles through `bursts` forever
    pub fn looping(bursts: Vec<Vec<u8>>) -> Self {
        Self {
            looped: bursts,
            ..Self::default()
        }
    }

    /// Queue one burst of raw bytes
    pub fn inject_burst(&mut self, data: &[u8]) {
        self.queued.push_back(data.to_vec());
    }

    /// Queue a burst made of framed NMEA sentence bodies
    pub fn inject_sentences(&mut self, bodies: &[&str]) {
        let burst = bodies.iter().flat_map(|body| nmea_frame(body)).collect::<Vec<u8>>();
        self.queued.push_back(burst);
    }

    /// Make the next `count` reads fail
    pub fn fail_next_reads(&mut self, count: usize) {
        self.fail_reads = count;
    }

    /// Number of bursts handed out so far
    pub fn bursts_served(&self) -> usize {
        self.bursts_served
    }

    /// Whether queued (non-looping) data remains
    pub fn has_pending(&self) -> bool {
        !self.current.is_empty() || !self.queued.is_empty()
    }

    fn refill(&mut self) {
        if !self.current.is_empty() {
            return;
        }
        let next = match self.queued.pop_front() {
            Some(burst) => Some(burst),
            None if !self.looped.is_empty() => {
                let burst = self.looped[self.next_loop].clone();
                self.next_loop = (self.next_loop + 1) % self.looped.len();
                Some(burst)
            }
            None => None,
        };
        if let Some(burst) = next {
            self.current = burst;
            self.bursts_served += 1;
        }
    }
}

impl SerialPort for MockSerial {
    fn available(&mut self) -> usize {
        self.refill();
        self.current.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        if self.fail_reads > 0 {
            self.fail_reads -= 1;
            return Err(SerialError::ReadFailed);
        }
        self.refill();
        let n = core::cmp::min(buf.len(), self.current.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current.drain(..n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nmea_frame_checksum() {
        let frame = nmea_frame("GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,");
        assert_eq!(
            frame,
            b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n".to_vec()
        );
    }

    #[test]
    fn test_bursts_are_served_one_at_a_time() {
        let mut serial = MockSerial::new();
        serial.inject_burst(b"abc");
        serial.inject_burst(b"de");

        assert_eq!(serial.available(), 3);
        let mut buf = [0u8; 8];
        assert_eq!(serial.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(serial.available(), 2);
        assert_eq!(serial.read(&mut buf).unwrap(), 2);
        assert_eq!(serial.available(), 0);
        assert_eq!(serial.bursts_served(), 2);
    }

    #[test]
    fn test_looping_port_never_runs_dry() {
        let mut serial = MockSerial::looping(vec![b"x".to_vec(), b"yz".to_vec()]);
        let mut buf = [0u8; 4];
        for expected in [1usize, 2, 1, 2] {
            assert_eq!(serial.available(), expected);
            assert_eq!(serial.read(&mut buf).unwrap(), expected);
        }
    }
}
