//! Logging abstraction
//!
//! Provides unified logging macros that work across different targets:
//! - Embedded (`defmt` feature): formatted into a fixed buffer, sent via defmt
//! - Host (tests or `std` feature): printed with a level prefix
//! - Otherwise: no-op
//!
//! The macros format on the caller side and hand a `fmt::Arguments` to
//! [`emit`], so the target is chosen by this crate's features rather than
//! the calling crate's.

use core::fmt;

/// Log message buffer size
#[cfg(feature = "defmt")]
const LOG_MSG_SIZE: usize = 192;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
    Trace,
}

impl LogLevel {
    /// Prefix printed in front of host log lines
    pub fn prefix(self) -> &'static str {
        match self {
            LogLevel::Info => "[INFO]",
            LogLevel::Warn => "[WARN]",
            LogLevel::Error => "[ERROR]",
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Trace => "[TRACE]",
        }
    }
}

/// Write one log record
///
/// Use the `log_*!` macros instead of calling this directly.
pub fn emit(level: LogLevel, args: fmt::Arguments<'_>) {
    #[cfg(feature = "defmt")]
    {
        let mut message = heapless::String::<LOG_MSG_SIZE>::new();
        // Truncated messages are still worth sending
        let _ = fmt::write(&mut message, args);
        match level {
            LogLevel::Info => defmt::info!("{=str}", message.as_str()),
            LogLevel::Warn => defmt::warn!("{=str}", message.as_str()),
            LogLevel::Error => defmt::error!("{=str}", message.as_str()),
            LogLevel::Debug => defmt::debug!("{=str}", message.as_str()),
            LogLevel::Trace => defmt::trace!("{=str}", message.as_str()),
        }
    }

    #[cfg(all(not(feature = "defmt"), any(test, feature = "std")))]
    match level {
        LogLevel::Error | LogLevel::Warn => std::eprintln!("{} {}", level.prefix(), args),
        _ => std::println!("{} {}", level.prefix(), args),
    }

    #[cfg(all(not(feature = "defmt"), not(any(test, feature = "std"))))]
    {
        let _ = (level, args);
    }
}

/// Log informational message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::core::logging::emit($crate::core::logging::LogLevel::Info, format_args!($($arg)*))
    };
}

/// Log warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::core::logging::emit($crate::core::logging::LogLevel::Warn, format_args!($($arg)*))
    };
}

/// Log error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::core::logging::emit($crate::core::logging::LogLevel::Error, format_args!($($arg)*))
    };
}

/// Log debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::core::logging::emit($crate::core::logging::LogLevel::Debug, format_args!($($arg)*))
    };
}

/// Log trace message
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        $crate::core::logging::emit($crate::core::logging::LogLevel::Trace, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert_eq!(LogLevel::Info.prefix(), "[INFO]");
        assert_eq!(LogLevel::Error.prefix(), "[ERROR]");
    }

    #[test]
    fn test_macros_accept_format_arguments() {
        let file = "tracks/TMC_a_1.csv";
        crate::log_info!("opening {}", file);
        crate::log_warn!("fix lost after {} cycles", 3);
        crate::log_debug!("plain message");
    }
}
