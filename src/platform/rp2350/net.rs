//! TCP listener on the CYW43 network stack
//!
//! One socket is reused for every client, so the server handles a single
//! connection at a time. Reads are bounded with `embassy_time::with_timeout`.

use crate::platform::error::NetError;
use crate::platform::traits::{Connection, Listener};
use embassy_net::tcp::TcpSocket;
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration};

/// Socket buffer size in each direction
pub const TCP_BUFFER_SIZE: usize = 4096;

/// Upper bound on the flush when a connection closes
const CLOSE_FLUSH_MS: u64 = 1000;

pub struct TcpServer<'d> {
    stack: Stack<'d>,
    port: u16,
    rx_buffer: [u8; TCP_BUFFER_SIZE],
    tx_buffer: [u8; TCP_BUFFER_SIZE],
}

impl<'d> TcpServer<'d> {
    pub fn new(stack: Stack<'d>, port: u16) -> Self {
        Self {
            stack,
            port,
            rx_buffer: [0; TCP_BUFFER_SIZE],
            tx_buffer: [0; TCP_BUFFER_SIZE],
        }
    }
}

impl<'d> Listener for TcpServer<'d> {
    type Conn<'a>
        = TcpConnection<'a>
    where
        Self: 'a;

    async fn accept(&mut self) -> Result<Self::Conn<'_>, NetError> {
        let mut socket = TcpSocket::new(self.stack, &mut self.rx_buffer, &mut self.tx_buffer);
        socket.accept(self.port).await.map_err(|e| {
            crate::log_warn!("TCP accept failed: {:?}", e);
            NetError::AcceptFailed
        })?;
        Ok(TcpConnection { socket })
    }
}

pub struct TcpConnection<'a> {
    socket: TcpSocket<'a>,
}

impl Connection for TcpConnection<'_> {
    async fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize, NetError> {
        match with_timeout(Duration::from_millis(timeout_ms), self.socket.read(buf)).await {
            Ok(Ok(n)) => Ok(n),
            Ok(Err(_)) => Err(NetError::ConnectionReset),
            Err(_) => Err(NetError::Timeout),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), NetError> {
        embedded_io_async::Write::write_all(&mut self.socket, data)
            .await
            .map_err(|_| NetError::WriteFailed)
    }

    async fn close(&mut self) {
        self.socket.close();
        let _ = with_timeout(Duration::from_millis(CLOSE_FLUSH_MS), self.socket.flush()).await;
        self.socket.abort();
    }
}
