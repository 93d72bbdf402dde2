//! HTTP transport over tokio TCP sockets

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use trail_mapper::platform::error::NetError;
use trail_mapper::platform::traits::{Connection, Listener};

pub struct TokioListener {
    inner: TcpListener,
}

impl TokioListener {
    pub async fn bind(addr: &str) -> std::io::Result<Self> {
        Ok(Self {
            inner: TcpListener::bind(addr).await?,
        })
    }

    pub fn local_port(&self) -> std::io::Result<u16> {
        Ok(self.inner.local_addr()?.port())
    }
}

impl Listener for TokioListener {
    type Conn<'a> = TokioConnection;

    async fn accept(&mut self) -> Result<TokioConnection, NetError> {
        let (stream, peer) = self.inner.accept().await.map_err(|e| {
            trail_mapper::log_warn!("accept failed: {}", e);
            NetError::AcceptFailed
        })?;
        trail_mapper::log_debug!("HTTP client {}", peer);
        Ok(TokioConnection { stream })
    }
}

pub struct TokioConnection {
    stream: TcpStream,
}

impl Connection for TokioConnection {
    async fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize, NetError> {
        match tokio::time::timeout(Duration::from_millis(timeout_ms), self.stream.read(buf)).await {
            Ok(Ok(n)) => Ok(n),
            Ok(Err(_)) => Err(NetError::ConnectionReset),
            Err(_) => Err(NetError::Timeout),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), NetError> {
        self.stream
            .write_all(data)
            .await
            .map_err(|_| NetError::WriteFailed)
    }

    async fn close(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}
