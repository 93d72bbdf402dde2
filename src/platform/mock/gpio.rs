//! Mock buttons and indicator LED for testing

use crate::platform::traits::{InputPin, OutputPin};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Button whose samples follow a script
///
/// Each `is_low` call consumes one scripted sample; once the script runs
/// out the button reads released.
#[derive(Debug, Default)]
pub struct MockButton {
    samples: VecDeque<bool>,
    reads: usize,
}

impl MockButton {
    /// Create a released button
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next samples (`true` = pressed)
    pub fn script(&mut self, samples: &[bool]) {
        self.samples.extend(samples.iter().copied());
    }

    /// Number of samples taken
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl InputPin for MockButton {
    fn is_low(&mut self) -> bool {
        self.reads += 1;
        self.samples.pop_front().unwrap_or(false)
    }
}

/// LED that remembers its level and how often it was switched on
#[derive(Debug, Clone, Default)]
pub struct MockLed {
    on: Arc<AtomicBool>,
    switched_on: Arc<AtomicUsize>,
}

impl MockLed {
    /// Create an LED that is off
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the LED is lit
    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }

    /// How many times the LED was switched on
    pub fn times_switched_on(&self) -> usize {
        self.switched_on.load(Ordering::SeqCst)
    }
}

impl OutputPin for MockLed {
    fn set_high(&mut self) {
        self.on.store(true, Ordering::SeqCst);
        self.switched_on.fetch_add(1, Ordering::SeqCst);
    }

    fn set_low(&mut self) {
        self.on.store(false, Ordering::SeqCst);
    }
}
