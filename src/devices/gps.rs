//! GPS session (NMEA over a serial port)
//!
//! Owns the serial port and the incremental NMEA parser and turns the
//! receiver's once-per-second sentence bursts into a [`FixSample`].
//!
//! Lifecycle:
//!
//! 1. [`GpsSession::initialize`] waits for a first fix, runs a settle update
//!    and sets the real-time clock. It must complete before the session is
//!    used for anything else.
//! 2. [`GpsSession::update`] runs read-parse cycles. Once the first fix is
//!    known, a cycle that ends without a current fix (stale, or at 0,0)
//!    logs a warning and earns one extra cycle, so callers get a fresh
//!    position rather than a failure.
//!
//! The parser combines two sentence types:
//! - **GGA**: position, satellites in use, dilution of precision, UTC time
//! - **RMC**: calendar date

use crate::config::GpsConfig;
use crate::core::traits::Clock;
use crate::platform::error::SerialError;
use crate::platform::traits::{NoIndicator, OutputPin, Rtc, SerialPort};
use crate::tracks::LatLon;
use alloc::string::String;
use alloc::vec::Vec;
use chrono::{NaiveDate, NaiveDateTime};
use core::fmt::Write;
use nmea0183::{ParseResult, Parser};

/// Meters per degree of latitude
pub const METERS_PER_DEG_LAT: f64 = 111_190.0;

/// Meters per degree of longitude near 40.1°N
///
/// Fixed for the deployment area; distances elsewhere are skewed.
pub const METERS_PER_DEG_LON: f64 = 85_050.0;

const READ_BUF: usize = 128;

/// One position and time solution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixSample {
    /// Signed degrees, north positive
    pub latitude: f64,
    /// Signed degrees, east positive
    pub longitude: f64,
    /// Unix seconds (UTC)
    pub timestamp_utc: i64,
    /// Satellites used in the solution
    pub satellites: u8,
    /// Dilution of precision reported with the solution
    pub pdop: f32,
}

impl FixSample {
    pub fn position(&self) -> LatLon {
        LatLon {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// What one [`GpsSession::update`] call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Read-parse cycles performed
    pub cycles: u32,
    /// Cycles that ended without a current fix
    pub losses: u32,
}

/// Planar distance in meters between two positions
///
/// Uses [`METERS_PER_DEG_LAT`] and [`METERS_PER_DEG_LON`]; good enough for
/// trail-scale distances near the deployment latitude.
pub fn distance(a: LatLon, b: LatLon) -> f64 {
    let dy = (a.latitude - b.latitude) * METERS_PER_DEG_LAT;
    let dx = (a.longitude - b.longitude) * METERS_PER_DEG_LON;
    libm::sqrt(dx * dx + dy * dy)
}

/// GPS receiver session
///
/// Generic over the serial port, the clock and an optional indicator LED
/// that is lit while an update requested with `indicator_on` runs.
pub struct GpsSession<P: SerialPort, C: Clock, L: OutputPin = NoIndicator> {
    serial: P,
    clock: C,
    indicator: L,
    parser: Parser,
    config: GpsConfig,
    has_initial_fix: bool,
    last_fix_ms: Option<u64>,
    position: Option<LatLon>,
    satellites: u8,
    pdop: f32,
    /// (year, month, day) from the last RMC sentence
    date: Option<(i32, u32, u32)>,
    /// (hours, minutes, seconds) from the last GGA sentence
    time: Option<(u32, u32, u32)>,
    clean_sentences: u32,
    fix_losses: u32,
}

impl<P: SerialPort, C: Clock> GpsSession<P, C> {
    /// Create a session without an indicator LED
    pub fn new(serial: P, clock: C, config: GpsConfig) -> Self {
        Self {
            serial,
            clock,
            indicator: NoIndicator,
            parser: Parser::new(),
            config,
            has_initial_fix: false,
            last_fix_ms: None,
            position: None,
            satellites: 0,
            pdop: 0.0,
            date: None,
            time: None,
            clean_sentences: 0,
            fix_losses: 0,
        }
    }

    /// Attach an indicator LED
    pub fn with_indicator<L: OutputPin>(self, indicator: L) -> GpsSession<P, C, L> {
        GpsSession {
            serial: self.serial,
            clock: self.clock,
            indicator,
            parser: self.parser,
            config: self.config,
            has_initial_fix: self.has_initial_fix,
            last_fix_ms: self.last_fix_ms,
            position: self.position,
            satellites: self.satellites,
            pdop: self.pdop,
            date: self.date,
            time: self.time,
            clean_sentences: self.clean_sentences,
            fix_losses: self.fix_losses,
        }
    }
}

impl<P: SerialPort, C: Clock, L: OutputPin> GpsSession<P, C, L> {
    /// Wait for the first fix, settle, then set `rtc`
    pub async fn initialize<R: Rtc>(&mut self, rtc: &mut R) {
        loop {
            self.update(1, false).await;
            if self.last_fix_ms.is_some() {
                break;
            }
            crate::log_info!("Waiting for GPS fix...");
            self.clock.sleep_ms(self.config.init_retry_ms).await;
        }
        self.update(self.config.settle_cycles, false).await;
        self.has_initial_fix = true;
        crate::log_info!("GPS fix obtained");

        match self.datetime() {
            Some(datetime) => {
                if let Err(e) = rtc.set_datetime(datetime) {
                    crate::log_warn!("Failed to set RTC: {:?}", e);
                }
            }
            None => crate::log_warn!("GPS date/time unavailable, RTC not set"),
        }
    }

    /// Run `count` read-parse cycles
    ///
    /// `count == 0` returns immediately without touching the port.
    pub async fn update(&mut self, count: u32, indicator_on: bool) -> UpdateReport {
        let mut report = UpdateReport::default();
        if count == 0 {
            return report;
        }
        if indicator_on {
            self.indicator.set_high();
        }

        let mut remaining = count;
        while remaining > 0 {
            self.read_cycle().await;
            report.cycles += 1;
            remaining -= 1;

            if self.has_initial_fix && self.fix_lost() {
                self.fix_losses += 1;
                report.losses += 1;
                remaining += 1;
                crate::log_warn!("GPS fix was lost\n{}", self.debug_info());
            }
            if remaining > 0 {
                self.clock.sleep_ms(self.config.cycle_interval_ms).await;
            }
        }

        if indicator_on {
            self.indicator.set_low();
        }
        report
    }

    /// Current fix
    ///
    /// Before the first GGA sentence the position reads as 0,0.
    pub fn fix(&self) -> FixSample {
        let position = self.position.unwrap_or(LatLon {
            latitude: 0.0,
            longitude: 0.0,
        });
        FixSample {
            latitude: position.latitude,
            longitude: position.longitude,
            timestamp_utc: self.timestamp(),
            satellites: self.satellites,
            pdop: self.pdop,
        }
    }

    /// Whether `initialize` has completed
    pub fn has_initial_fix(&self) -> bool {
        self.has_initial_fix
    }

    /// Milliseconds since the last position solution
    pub fn fix_age_ms(&self) -> Option<u64> {
        self.last_fix_ms.map(|t| self.clock.elapsed_since(t))
    }

    /// Number of cycles that ended without a current fix
    pub fn fix_losses(&self) -> u32 {
        self.fix_losses
    }

    /// UTC date/time of the last solution
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        let (hours, minutes, seconds) = self.time?;
        let (year, month, day) = self.date.unwrap_or((2000, 1, 1));
        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hours, minutes, seconds)
    }

    /// Multi-line diagnostic text
    pub fn debug_info(&self) -> String {
        let mut out = String::new();
        let fix = self.fix();
        let _ = match self.time {
            Some((h, m, s)) => writeln!(out, "time: {:02}:{:02}:{:02}", h, m, s),
            None => writeln!(out, "time: unknown"),
        };
        let _ = writeln!(out, "clean sentences: {}", self.clean_sentences);
        let _ = match self.fix_age_ms() {
            Some(age) => writeln!(out, "time since last fix: {} ms", age),
            None => writeln!(out, "time since last fix: none"),
        };
        let _ = writeln!(out, "satellites used: {}", fix.satellites);
        let _ = writeln!(out, "position dilution: {}", fix.pdop);
        let _ = writeln!(out, "lat: {}", fix.latitude);
        let _ = writeln!(out, "long: {}", fix.longitude);
        let _ = writeln!(out, "fix losses: {}", self.fix_losses);
        out
    }

    fn timestamp(&self) -> i64 {
        self.datetime()
            .map(|datetime| datetime.and_utc().timestamp())
            .unwrap_or(0)
    }

    fn fix_lost(&self) -> bool {
        let stale = match self.fix_age_ms() {
            Some(age) => age > self.config.fix_stale_ms,
            None => true,
        };
        let degenerate = self
            .position
            .map_or(true, |p| p.latitude == 0.0 && p.longitude == 0.0);
        stale || degenerate
    }

    /// Read and parse one burst, retrying until one arrives intact
    async fn read_cycle(&mut self) {
        loop {
            let available = self.serial.available();
            if available == 0 {
                self.clock.sleep_ms(self.config.no_data_retry_ms).await;
                continue;
            }
            match self.read_available(available) {
                Ok(data) if data.is_ascii() => {
                    self.feed(&data);
                    return;
                }
                Ok(_) => crate::log_debug!("GPS data is not ASCII, retrying"),
                Err(e) => crate::log_debug!("GPS read failed: {:?}", e),
            }
            self.clock.sleep_ms(self.config.no_data_retry_ms).await;
        }
    }

    /// Read exactly what was buffered when the cycle started
    fn read_available(&mut self, available: usize) -> Result<Vec<u8>, SerialError> {
        let mut data = Vec::with_capacity(available);
        let mut buf = [0u8; READ_BUF];
        while data.len() < available {
            let want = core::cmp::min(buf.len(), available - data.len());
            let n = self.serial.read(&mut buf[..want])?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
        }
        Ok(data)
    }

    fn feed(&mut self, data: &[u8]) {
        for &byte in data {
            match self.parser.parse_from_byte(byte) {
                Some(Ok(ParseResult::GGA(Some(gga)))) => {
                    self.clean_sentences += 1;
                    self.position = Some(LatLon {
                        latitude: gga.latitude.as_f64(),
                        longitude: gga.longitude.as_f64(),
                    });
                    self.satellites = gga.sat_in_use;
                    self.pdop = gga.hdop;
                    self.time = Some((
                        u32::from(gga.time.hours),
                        u32::from(gga.time.minutes),
                        gga.time.seconds as u32,
                    ));
                    self.last_fix_ms = Some(self.clock.now_ms());
                }
                Some(Ok(ParseResult::RMC(Some(rmc)))) => {
                    self.clean_sentences += 1;
                    let date = &rmc.datetime.date;
                    let mut year = i32::from(date.year);
                    if year < 100 {
                        year += 2000;
                    }
                    self.date = Some((year, u32::from(date.month), u32::from(date.day)));
                }
                Some(Ok(_)) => self.clean_sentences += 1,
                Some(Err(e)) => crate::log_debug!("NMEA parse error: {}", e),
                None => {}
            }
        }
    }
}
