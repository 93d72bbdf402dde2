//! Mock network connection and listener for testing

use crate::platform::{
    error::NetError,
    traits::{Connection, Listener},
};
use std::collections::VecDeque;
use std::string::String;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::vec::Vec;

/// One scripted outcome of [`Connection::read`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStep {
    /// Deliver these bytes
    Data(Vec<u8>),
    /// Report a read timeout
    Timeout,
    /// Report that the peer closed its side
    Closed,
    /// Report a reset connection
    Reset,
}

/// Shared view of what a [`MockConnection`] saw, usable after the
/// connection has been moved into the server
#[derive(Debug, Clone, Default)]
pub struct MockProbe {
    written: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
}

impl MockProbe {
    /// Everything written to the connection
    pub fn written(&self) -> Vec<u8> {
        self.written
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }

    /// Written bytes as text
    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.written()).into_owned()
    }

    /// Whether `close` was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Mock TCP connection
///
/// Reads follow a script; once the script is exhausted every read times
/// out, which is how a client that has finished sending looks to the
/// server.
#[derive(Debug, Default)]
pub struct MockConnection {
    script: VecDeque<ReadStep>,
    probe: MockProbe,
    timeouts_seen: Vec<u64>,
}

impl MockConnection {
    /// Create a connection with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connection that delivers `request` in one read
    pub fn with_request(request: &[u8]) -> Self {
        let mut conn = Self::new();
        conn.push(ReadStep::Data(request.to_vec()));
        conn
    }

    /// Append a step to the read script
    pub fn push(&mut self, step: ReadStep) {
        self.script.push_back(step);
    }

    /// Handle for inspecting writes and close state
    pub fn probe(&self) -> MockProbe {
        self.probe.clone()
    }

    /// Timeouts passed to each read call
    pub fn timeouts_seen(&self) -> &[u64] {
        &self.timeouts_seen
    }
}

impl Connection for MockConnection {
    async fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize, NetError> {
        self.timeouts_seen.push(timeout_ms);
        match self.script.pop_front() {
            Some(ReadStep::Data(mut data)) => {
                let n = core::cmp::min(buf.len(), data.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    let rest = data.split_off(n);
                    self.script.push_front(ReadStep::Data(rest));
                }
                Ok(n)
            }
            Some(ReadStep::Closed) => Ok(0),
            Some(ReadStep::Reset) => Err(NetError::ConnectionReset),
            Some(ReadStep::Timeout) | None => Err(NetError::Timeout),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), NetError> {
        if self.probe.closed.load(Ordering::SeqCst) {
            return Err(NetError::Closed);
        }
        self.probe
            .written
            .lock()
            .map_err(|_| NetError::WriteFailed)?
            .extend_from_slice(data);
        Ok(())
    }

    async fn close(&mut self) {
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}

/// Mock listener handing out queued connections
///
/// `accept` on an empty queue never completes, like a real socket with no
/// clients.
#[derive(Debug, Default)]
pub struct MockListener {
    pending: VecDeque<MockConnection>,
}

impl MockListener {
    /// Create a listener with no queued clients
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a client connection
    pub fn push(&mut self, conn: MockConnection) {
        self.pending.push_back(conn);
    }
}

impl Listener for MockListener {
    type Conn<'a> = MockConnection;

    async fn accept(&mut self) -> Result<MockConnection, NetError> {
        match self.pending.pop_front() {
            Some(conn) => Ok(conn),
            None => core::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_large_data_step_is_split_across_reads() {
        let mut conn = MockConnection::with_request(b"abcdef");
        let mut buf = [0u8; 4];
        assert_eq!(conn.read(&mut buf, 500).await, Ok(4));
        assert_eq!(&buf, b"abcd");
        assert_eq!(conn.read(&mut buf, 500).await, Ok(2));
        assert_eq!(conn.read(&mut buf, 500).await, Err(NetError::Timeout));
        assert_eq!(conn.timeouts_seen(), &[500, 500, 500]);
    }

    #[tokio::test]
    async fn test_probe_sees_writes_after_close() {
        let mut conn = MockConnection::new();
        let probe = conn.probe();
        conn.write_all(b"HTTP/1.0 200 OK\r\n").await.unwrap();
        conn.close().await;
        assert!(probe.is_closed());
        assert_eq!(probe.written_text(), "HTTP/1.0 200 OK\r\n");
        assert_eq!(conn.write_all(b"late").await, Err(NetError::Closed));
    }
}
