//! RP2350 GPIO implementation
//!
//! Thin wrappers over `embassy_rp::gpio` so keys and the indicator LED can be
//! handed to the button listener and the GPS session.

use crate::platform::traits::{InputPin, OutputPin};
use embassy_rp::gpio::{Input, Output};

/// Active-low key input (configure the pin with a pull-up)
pub struct Key<'d>(Input<'d>);

impl<'d> Key<'d> {
    pub fn new(pin: Input<'d>) -> Self {
        Self(pin)
    }
}

impl InputPin for Key<'_> {
    fn is_low(&mut self) -> bool {
        self.0.is_low()
    }
}

/// Indicator LED driven while the GPS is read
pub struct Indicator<'d>(Output<'d>);

impl<'d> Indicator<'d> {
    pub fn new(pin: Output<'d>) -> Self {
        Self(pin)
    }
}

impl OutputPin for Indicator<'_> {
    fn set_high(&mut self) {
        self.0.set_high();
    }

    fn set_low(&mut self) {
        self.0.set_low();
    }
}
