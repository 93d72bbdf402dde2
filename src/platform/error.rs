//! Platform error types
//!
//! Each platform trait reports failures with its own small error enum so
//! callers can match on the cases they recover from (a read timeout, a
//! missing file). `PlatformError` aggregates them for code that only needs
//! to propagate.

use core::fmt;

/// Result type for platform operations
pub type Result<T> = core::result::Result<T, PlatformError>;

/// Platform-level errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlatformError {
    /// Filesystem operation failed
    Storage(StorageError),
    /// Serial port operation failed
    Serial(SerialError),
    /// Network operation failed
    Net(NetError),
    /// Display operation failed
    Display(DisplayError),
    /// Real-time clock operation failed
    Rtc(RtcError),
    /// Platform initialization failed
    InitializationFailed,
    /// Resource not available
    ResourceUnavailable,
}

/// Filesystem errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// No file or directory at the given path
    NotFound,
    /// Another file is still open (the volume allows one at a time)
    AlreadyOpen,
    /// Volume is full
    NoSpace,
    /// Path is not acceptable to the filesystem
    InvalidPath,
    /// Read failed
    ReadFailed,
    /// Write failed
    WriteFailed,
    /// Seek beyond the end of the file or seek failed
    SeekFailed,
    /// Unclassified driver error
    Io,
}

/// Serial port errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialError {
    /// Read operation failed
    ReadFailed,
    /// Receive buffer overrun
    Overrun,
    /// Framing error
    FramingError,
}

/// Network errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetError {
    /// No data arrived within the read timeout
    Timeout,
    /// Peer closed the connection
    Closed,
    /// Connection reset or aborted
    ConnectionReset,
    /// Listening socket could not accept
    AcceptFailed,
    /// Write failed
    WriteFailed,
}

/// Display errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayError {
    /// Panel did not report ready
    Busy,
    /// SPI/bus transfer failed
    Bus,
    /// Drawing outside the panel
    OutOfBounds,
}

/// Real-time clock errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RtcError {
    /// Date/time not representable by the clock
    InvalidDateTime,
    /// Clock has never been set
    NotSet,
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::Storage(e) => write!(f, "Storage error: {}", e),
            PlatformError::Serial(e) => write!(f, "Serial error: {:?}", e),
            PlatformError::Net(e) => write!(f, "Network error: {}", e),
            PlatformError::Display(e) => write!(f, "Display error: {:?}", e),
            PlatformError::Rtc(e) => write!(f, "RTC error: {:?}", e),
            PlatformError::InitializationFailed => write!(f, "Platform initialization failed"),
            PlatformError::ResourceUnavailable => write!(f, "Resource not available"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound => write!(f, "file not found"),
            StorageError::AlreadyOpen => write!(f, "another file is already open"),
            StorageError::NoSpace => write!(f, "no space left on volume"),
            StorageError::InvalidPath => write!(f, "invalid path"),
            StorageError::ReadFailed => write!(f, "read failed"),
            StorageError::WriteFailed => write!(f, "write failed"),
            StorageError::SeekFailed => write!(f, "seek failed"),
            StorageError::Io => write!(f, "I/O error"),
        }
    }
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::Timeout => write!(f, "read timed out"),
            NetError::Closed => write!(f, "connection closed"),
            NetError::ConnectionReset => write!(f, "connection reset"),
            NetError::AcceptFailed => write!(f, "accept failed"),
            NetError::WriteFailed => write!(f, "write failed"),
        }
    }
}

impl From<StorageError> for PlatformError {
    fn from(e: StorageError) -> Self {
        PlatformError::Storage(e)
    }
}

impl From<SerialError> for PlatformError {
    fn from(e: SerialError) -> Self {
        PlatformError::Serial(e)
    }
}

impl From<NetError> for PlatformError {
    fn from(e: NetError) -> Self {
        PlatformError::Net(e)
    }
}

impl From<DisplayError> for PlatformError {
    fn from(e: DisplayError) -> Self {
        PlatformError::Display(e)
    }
}

impl From<RtcError> for PlatformError {
    fn from(e: RtcError) -> Self {
        PlatformError::Rtc(e)
    }
}
