//! Device state machine cell
//!
//! ```text
//!   Idle ──begin_tracking()──▶ Tracking ──request_stop()──▶ Stopping
//!    ▲                                                        │
//!    └────────────── TrackingToken dropped ◀──────────────────┘
//! ```
//!
//! Any component may request Idle → Tracking or Tracking → Stopping. Only
//! the recording loop returns the device to Idle, and it does so by
//! dropping the [`TrackingToken`] it received from
//! [`DeviceStateCell::begin_tracking`]. Because the token is dropped on
//! every exit path (including errors), the device cannot get stuck in
//! Tracking or Stopping after the loop ends.

use core::cell::Cell;
use core::fmt;
use critical_section::Mutex;

/// Recording state of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceState {
    /// Not recording
    Idle,
    /// Recording loop running
    Tracking,
    /// Stop requested, recording loop finishing its current row
    Stopping,
}

impl DeviceState {
    /// Upper-case name shown on pages and the display
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceState::Idle => "IDLE",
            DeviceState::Tracking => "TRACKING",
            DeviceState::Stopping => "STOPPING",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide device state
pub struct DeviceStateCell {
    state: Mutex<Cell<DeviceState>>,
}

/// Device-wide state instance
pub static DEVICE_STATE: DeviceStateCell = DeviceStateCell::new();

impl DeviceStateCell {
    /// Create a cell in the Idle state
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(DeviceState::Idle)),
        }
    }

    /// Current state
    pub fn get(&self) -> DeviceState {
        critical_section::with(|cs| self.state.borrow(cs).get())
    }

    /// Idle → Tracking
    ///
    /// Returns the token that authorizes the eventual return to Idle, or
    /// `None` if the device was not idle.
    pub fn begin_tracking(&self) -> Option<TrackingToken<'_>> {
        let started = critical_section::with(|cs| {
            let state = self.state.borrow(cs);
            if state.get() == DeviceState::Idle {
                state.set(DeviceState::Tracking);
                true
            } else {
                false
            }
        });
        if started {
            crate::log_info!("State change: {}", DeviceState::Tracking);
            Some(TrackingToken { cell: self })
        } else {
            None
        }
    }

    /// Tracking → Stopping
    ///
    /// Returns false (and changes nothing) unless the device was tracking.
    pub fn request_stop(&self) -> bool {
        let stopping = critical_section::with(|cs| {
            let state = self.state.borrow(cs);
            if state.get() == DeviceState::Tracking {
                state.set(DeviceState::Stopping);
                true
            } else {
                false
            }
        });
        if stopping {
            crate::log_info!("State change: {}", DeviceState::Stopping);
        }
        stopping
    }

    fn set_idle(&self) {
        critical_section::with(|cs| self.state.borrow(cs).set(DeviceState::Idle));
        crate::log_info!("State change: {}", DeviceState::Idle);
    }
}

impl Default for DeviceStateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof that the holder owns the current recording session
///
/// Dropping the token moves the device to Idle.
pub struct TrackingToken<'a> {
    cell: &'a DeviceStateCell,
}

impl TrackingToken<'_> {
    /// Whether a stop has been requested
    pub fn stop_requested(&self) -> bool {
        self.cell.get() == DeviceState::Stopping
    }
}

impl Drop for TrackingToken<'_> {
    fn drop(&mut self) {
        self.cell.set_idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_full_cycle() {
        let cell = DeviceStateCell::new();
        assert_eq!(cell.get(), DeviceState::Idle);

        let token = cell.begin_tracking().unwrap();
        assert_eq!(cell.get(), DeviceState::Tracking);
        assert!(!token.stop_requested());

        assert!(cell.request_stop());
        assert_eq!(cell.get(), DeviceState::Stopping);
        assert!(token.stop_requested());

        drop(token);
        assert_eq!(cell.get(), DeviceState::Idle);
    }

    #[test]
    fn test_begin_tracking_only_from_idle() {
        let cell = DeviceStateCell::new();
        let _token = cell.begin_tracking().unwrap();
        assert!(cell.begin_tracking().is_none());
        cell.request_stop();
        assert!(cell.begin_tracking().is_none());
    }

    #[test]
    fn test_request_stop_ignored_unless_tracking() {
        let cell = DeviceStateCell::new();
        assert!(!cell.request_stop());
        assert_eq!(cell.get(), DeviceState::Idle);

        let _token = cell.begin_tracking().unwrap();
        assert!(cell.request_stop());
        assert!(!cell.request_stop());
        assert_eq!(cell.get(), DeviceState::Stopping);
    }

    #[test]
    #[serial]
    fn test_global_state_returns_to_idle() {
        {
            let _token = DEVICE_STATE.begin_tracking().unwrap();
            assert_eq!(DEVICE_STATE.get(), DeviceState::Tracking);
        }
        assert_eq!(DEVICE_STATE.get(), DeviceState::Idle);
    }
}
