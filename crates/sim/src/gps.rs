//! Simulated GPS receiver
//!
//! Emits one sentence group per pacing interval, the way a receiver does
//! once per second. The sentences either come from a recorded NMEA log
//! (replayed in a loop) or are synthesized for a walker wandering away from
//! a start point.

use crate::error::SimError;
use chrono::{NaiveDateTime, TimeDelta, Timelike};
use std::path::Path;
use std::time::{Duration, Instant};
use trail_mapper::devices::gps::{METERS_PER_DEG_LAT, METERS_PER_DEG_LON};
use trail_mapper::platform::error::SerialError;
use trail_mapper::platform::mock::nmea_frame;
use trail_mapper::platform::traits::SerialPort;

/// Heading change per step, degrees
const WANDER_DEG: f64 = 7.0;

/// Synthetic walker
#[derive(Debug, Clone)]
pub struct Walker {
    latitude: f64,
    longitude: f64,
    heading_deg: f64,
    speed_mps: f64,
    satellites: u8,
    time: NaiveDateTime,
    step: u64,
}

impl Walker {
    pub fn new(latitude: f64, longitude: f64, speed_mps: f64, start: NaiveDateTime) -> Self {
        Self {
            latitude,
            longitude,
            heading_deg: 0.0,
            speed_mps,
            satellites: 8,
            time: start,
            step: 0,
        }
    }

    /// GGA and RMC for the current position, then advance one second
    fn next_burst(&mut self) -> Vec<u8> {
        let mut burst = nmea_frame(&self.gga());
        burst.extend_from_slice(&nmea_frame(&self.rmc()));

        self.step += 1;
        // Gentle S-curve: turn one way for a minute, then the other
        if (self.step / 60) % 2 == 0 {
            self.heading_deg += WANDER_DEG;
        } else {
            self.heading_deg -= WANDER_DEG;
        }
        let heading = self.heading_deg.to_radians();
        self.latitude += self.speed_mps * heading.cos() / METERS_PER_DEG_LAT;
        self.longitude += self.speed_mps * heading.sin() / METERS_PER_DEG_LON;
        self.time += TimeDelta::seconds(1);
        burst
    }

    fn hhmmss(&self) -> String {
        format!(
            "{:02}{:02}{:02}",
            self.time.hour(),
            self.time.minute(),
            self.time.second()
        )
    }

    fn gga(&self) -> String {
        let (lat, ns) = nmea_angle(self.latitude, 2, 'N', 'S');
        let (lon, ew) = nmea_angle(self.longitude, 3, 'E', 'W');
        format!(
            "GPGGA,{},{},{},{},{},1,{:02},0.9,120.0,M,0.0,M,,",
            self.hhmmss(),
            lat,
            ns,
            lon,
            ew,
            self.satellites
        )
    }

    fn rmc(&self) -> String {
        let (lat, ns) = nmea_angle(self.latitude, 2, 'N', 'S');
        let (lon, ew) = nmea_angle(self.longitude, 3, 'E', 'W');
        let knots = self.speed_mps * 1.943_844;
        let course = self.heading_deg.rem_euclid(360.0);
        format!(
            "GPRMC,{},A,{},{},{},{},{:05.1},{:05.1},{},000.0,E",
            self.hhmmss(),
            lat,
            ns,
            lon,
            ew,
            knots,
            course,
            self.time.format("%d%m%y")
        )
    }
}

/// `ddmm.mmmm` / `dddmm.mmmm` and hemisphere
fn nmea_angle(value: f64, degree_digits: usize, positive: char, negative: char) -> (String, char) {
    let hemisphere = if value < 0.0 { negative } else { positive };
    let value = value.abs();
    let degrees = value.trunc();
    let minutes = (value - degrees) * 60.0;
    (
        format!("{:0width$}{:07.4}", degrees as u32, minutes, width = degree_digits),
        hemisphere,
    )
}

#[derive(Debug)]
enum Source {
    Replay { bursts: Vec<Vec<u8>>, next: usize },
    Walk(Walker),
}

/// Serial port fed by a replay log or a [`Walker`]
#[derive(Debug)]
pub struct SimReceiver {
    source: Source,
    pacing: Duration,
    next_due: Instant,
    pending: Vec<u8>,
}

impl SimReceiver {
    pub fn walk(walker: Walker, pacing: Duration) -> Self {
        Self::with_source(Source::Walk(walker), pacing)
    }

    /// Split a recorded NMEA log into bursts, one per GGA sentence
    pub fn replay_text(text: &str, pacing: Duration) -> Option<Self> {
        let mut bursts: Vec<Vec<u8>> = Vec::new();
        for line in text.lines().map(str::trim).filter(|l| l.starts_with('$')) {
            let starts_group = line.get(3..6) == Some("GGA");
            if starts_group || bursts.is_empty() {
                bursts.push(Vec::new());
            }
            if let Some(burst) = bursts.last_mut() {
                burst.extend_from_slice(line.as_bytes());
                burst.extend_from_slice(b"\r\n");
            }
        }
        if bursts.is_empty() {
            return None;
        }
        Some(Self::with_source(Source::Replay { bursts, next: 0 }, pacing))
    }

    pub fn replay_file(path: &Path, pacing: Duration) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path)?;
        Self::replay_text(&text, pacing).ok_or_else(|| SimError::EmptyReplay(path.to_path_buf()))
    }

    fn with_source(source: Source, pacing: Duration) -> Self {
        Self {
            source,
            pacing,
            next_due: Instant::now(),
            pending: Vec::new(),
        }
    }

    fn refill(&mut self) {
        if !self.pending.is_empty() || Instant::now() < self.next_due {
            return;
        }
        self.pending = match &mut self.source {
            Source::Replay { bursts, next } => {
                let burst = bursts[*next].clone();
                *next = (*next + 1) % bursts.len();
                burst
            }
            Source::Walk(walker) => walker.next_burst(),
        };
        self.next_due = Instant::now() + self.pacing;
    }
}

impl SerialPort for SimReceiver {
    fn available(&mut self) -> usize {
        self.refill();
        self.pending.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use trail_mapper::config::GpsConfig;
    use trail_mapper::devices::GpsSession;
    use trail_mapper::platform::mock::{MockClock, MockRtc};
    use trail_mapper::platform::traits::Rtc;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .unwrap()
    }

    #[test]
    fn test_nmea_angle_formatting() {
        assert_eq!(nmea_angle(48.1173, 2, 'N', 'S'), (String::from("4807.0380"), 'N'));
        assert_eq!(nmea_angle(-75.5, 3, 'E', 'W'), (String::from("07530.0000"), 'W'));
    }

    #[tokio::test]
    async fn test_walker_sentences_parse_into_fixes() {
        let serial = SimReceiver::walk(Walker::new(40.25, -75.5, 1.4, start()), Duration::ZERO);
        let mut session = GpsSession::new(serial, MockClock::new(), GpsConfig::default());
        let mut rtc = MockRtc::new();
        session.initialize(&mut rtc).await;

        let fix = session.fix();
        assert!((fix.latitude - 40.25).abs() < 0.001, "latitude {}", fix.latitude);
        assert!((fix.longitude + 75.5).abs() < 0.001, "longitude {}", fix.longitude);
        assert_eq!(fix.satellites, 8);
        assert!(rtc.now().unwrap() >= start());
        assert!(fix.timestamp_utc >= start().and_utc().timestamp());
    }

    #[test]
    fn test_replay_groups_by_gga() {
        let log = "$GPGGA,1*00\r\n$GPRMC,1*00\r\n$GPGSA,1*00\r\ngarbage\n$GPGGA,2*00\r\n";
        let mut serial = SimReceiver::replay_text(log, Duration::ZERO).unwrap();
        let mut buf = [0u8; 256];

        let n = serial.available();
        assert_eq!(serial.read(&mut buf), Ok(n));
        assert_eq!(&buf[..n], b"$GPGGA,1*00\r\n$GPRMC,1*00\r\n$GPGSA,1*00\r\n");

        let n = serial.available();
        assert_eq!(serial.read(&mut buf), Ok(n));
        assert_eq!(&buf[..n], b"$GPGGA,2*00\r\n");

        // Loops back to the start
        let n = serial.available();
        serial.read(&mut buf).unwrap();
        assert!(buf[..n].starts_with(b"$GPGGA,1*00"));
    }

    #[test]
    fn test_replay_without_sentences_is_rejected() {
        assert!(SimReceiver::replay_text("no nmea here\n", Duration::ZERO).is_none());
    }

    #[test]
    fn test_pacing_holds_back_next_burst() {
        let mut serial = SimReceiver::walk(Walker::new(1.0, 1.0, 1.0, start()), Duration::from_secs(3600));
        let n = serial.available();
        assert!(n > 0);
        let mut buf = vec![0u8; n];
        serial.read(&mut buf).unwrap();
        assert_eq!(serial.available(), 0);
    }
}
