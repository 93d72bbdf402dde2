//! Physical buttons
//!
//! Three active-low keys are sampled at the poll interval (which also
//! debounces them). A pressed key is sampled again after the hold duration:
//! still pressed means a long press, released means a short press. After a
//! long press the listener waits for the release so one press is reported
//! once.

use crate::config::ButtonConfig;
use crate::core::traits::Clock;
use crate::platform::traits::InputPin;
use serde::{Deserialize, Serialize};

/// Number of keys on the device
pub const KEY_COUNT: usize = 3;

/// Press duration class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Press {
    Short,
    Long,
}

/// What a key press does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonAction {
    /// Start recording when idle, stop otherwise
    ToggleRecording,
    /// Draw the recorded trails
    DisplayTrails,
    /// Draw the current status frame
    DisplayStatus,
    /// Draw the GPS diagnostic text
    DisplayGpsDebug,
    /// Blank the display
    ClearDisplay,
    /// Ignore the press
    None,
}

/// Action per key, for short and long presses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBinding {
    pub short: ButtonAction,
    pub long: ButtonAction,
}

/// Key → action table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonMap {
    pub keys: [KeyBinding; KEY_COUNT],
}

impl Default for ButtonMap {
    fn default() -> Self {
        Self {
            keys: [
                KeyBinding {
                    short: ButtonAction::ToggleRecording,
                    long: ButtonAction::DisplayStatus,
                },
                KeyBinding {
                    short: ButtonAction::DisplayTrails,
                    long: ButtonAction::ClearDisplay,
                },
                KeyBinding {
                    short: ButtonAction::DisplayGpsDebug,
                    long: ButtonAction::None,
                },
            ],
        }
    }
}

impl ButtonMap {
    /// Action bound to `press` of key `key`
    pub fn action(&self, key: usize, press: Press) -> ButtonAction {
        match self.keys.get(key) {
            Some(binding) => match press {
                Press::Short => binding.short,
                Press::Long => binding.long,
            },
            None => ButtonAction::None,
        }
    }
}

/// Polls the keys and classifies presses
pub struct ButtonListener<B: InputPin, C: Clock> {
    keys: [B; KEY_COUNT],
    clock: C,
    poll_interval_ms: u64,
    hold_ms: u64,
}

impl<B: InputPin, C: Clock> ButtonListener<B, C> {
    pub fn new(keys: [B; KEY_COUNT], clock: C, config: &ButtonConfig) -> Self {
        Self {
            keys,
            clock,
            poll_interval_ms: config.poll_interval_ms,
            hold_ms: config.hold_ms,
        }
    }

    /// Wait for the next press; returns the key index and press class
    pub async fn next_press(&mut self) -> (usize, Press) {
        loop {
            if let Some(key) = self.keys.iter_mut().position(|k| k.is_low()) {
                let press = self.classify(key).await;
                crate::log_debug!("Key {} pressed ({:?})", key, press);
                return (key, press);
            }
            self.clock.sleep_ms(self.poll_interval_ms).await;
        }
    }

    async fn classify(&mut self, key: usize) -> Press {
        self.clock.sleep_ms(self.hold_ms).await;
        if !self.keys[key].is_low() {
            return Press::Short;
        }
        while self.keys[key].is_low() {
            self.clock.sleep_ms(self.poll_interval_ms).await;
        }
        Press::Long
    }
}
