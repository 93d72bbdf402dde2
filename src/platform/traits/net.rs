//! Network interface traits
//!
//! The HTTP server handles one connection at a time. A connection read that
//! sees no data within its timeout reports `NetError::Timeout`, which the
//! server treats as the end of the request.

use crate::platform::error::NetError;

/// An accepted TCP connection
#[allow(async_fn_in_trait)]
pub trait Connection {
    /// Read into `buf`, waiting at most `timeout_ms` for the first byte
    ///
    /// # Returns
    ///
    /// - `Ok(n)` with `n > 0` - bytes received
    /// - `Ok(0)` - peer closed its side
    /// - `Err(NetError::Timeout)` - nothing arrived in time
    async fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize, NetError>;

    /// Write all of `data`
    async fn write_all(&mut self, data: &[u8]) -> Result<(), NetError>;

    /// Flush and close the connection
    async fn close(&mut self);
}

/// A listening socket
#[allow(async_fn_in_trait)]
pub trait Listener {
    /// Connection type handed out by [`Listener::accept`]
    type Conn<'a>: Connection
    where
        Self: 'a;

    /// Wait for the next client
    async fn accept(&mut self) -> Result<Self::Conn<'_>, NetError>;
}
