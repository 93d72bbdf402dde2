//! GPIO interface traits
//!
//! Buttons are active-low inputs with pull-ups; the indicator LED is a plain
//! push-pull output.

/// Digital input
pub trait InputPin {
    /// Whether the pin currently reads low (button pressed)
    fn is_low(&mut self) -> bool;
}

/// Digital output
pub trait OutputPin {
    /// Drive the pin high
    fn set_high(&mut self);

    /// Drive the pin low
    fn set_low(&mut self);
}

/// Placeholder for boards without an indicator LED
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndicator;

impl OutputPin for NoIndicator {
    fn set_high(&mut self) {}

    fn set_low(&mut self) {}
}
