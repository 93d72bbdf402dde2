//! Connection cycle
//!
//! Accept, read until timeout, parse, route, respond, close. Connections
//! are served one at a time. A parse or socket error drops the connection
//! without a response; there is no 500 page.

use super::{HttpError, Request, Response, ResponseBody, RouteTable};
use crate::config::HttpConfig;
use crate::core::file_lock::FileLock;
use crate::platform::error::NetError;
use crate::platform::traits::{Connection, File, Listener, OpenMode, Storage};
use alloc::vec;
use alloc::vec::Vec;

/// Request handlers, selected by endpoint
#[allow(async_fn_in_trait)]
pub trait Service {
    type Endpoint: Copy;

    /// Produce the response for a routed request
    ///
    /// May suspend arbitrarily (GPS updates, file lock).
    async fn call(&self, endpoint: Self::Endpoint, request: &Request) -> Response;
}

/// The HTTP server
pub struct HttpServer<'a, S: Storage, E: Copy> {
    routes: RouteTable<E>,
    files: &'a FileLock<S>,
    config: HttpConfig,
}

impl<'a, S: Storage, E: Copy> HttpServer<'a, S, E> {
    pub fn new(routes: RouteTable<E>, files: &'a FileLock<S>, config: HttpConfig) -> Self {
        Self {
            routes,
            files,
            config,
        }
    }

    /// Serve connections forever
    pub async fn run<L, V>(&self, listener: &mut L, service: &V) -> !
    where
        L: Listener,
        V: Service<Endpoint = E>,
    {
        loop {
            match listener.accept().await {
                Ok(mut conn) => {
                    if let Err(e) = self.serve_connection(&mut conn, service).await {
                        crate::log_warn!("Connection dropped: {}", e);
                    }
                }
                Err(e) => crate::log_warn!("Accept failed: {}", e),
            }
        }
    }

    /// Handle one connection and close it
    ///
    /// Returns the response status, or `None` when the client sent nothing.
    pub async fn serve_connection<C, V>(&self, conn: &mut C, service: &V) -> Result<Option<u16>, HttpError>
    where
        C: Connection,
        V: Service<Endpoint = E>,
    {
        let result = self.handle(conn, service).await;
        conn.close().await;
        result
    }

    async fn handle<C, V>(&self, conn: &mut C, service: &V) -> Result<Option<u16>, HttpError>
    where
        C: Connection,
        V: Service<Endpoint = E>,
    {
        let Some(buf) = self.receive(conn).await? else {
            crate::log_debug!("No data received before timeout, closing");
            return Ok(None);
        };
        let request = Request::parse(&buf)?;
        crate::log_info!("{} {}", request.method, request.path);

        let response = match self.routes.lookup(&request.path, &request.method) {
            Some(endpoint) => service.call(endpoint, &request).await,
            None => {
                crate::log_info!("404 Not Found: {}", request.path);
                Response::not_found()
            }
        };
        self.send(conn, &response).await?;
        Ok(Some(response.status))
    }

    /// Accumulate reads until one times out or the peer closes
    async fn receive<C: Connection>(&self, conn: &mut C) -> Result<Option<Vec<u8>>, HttpError> {
        let mut buf = Vec::new();
        let mut chunk = vec![0u8; self.config.read_chunk.max(1)];
        loop {
            match conn.read(&mut chunk, self.config.read_timeout_ms).await {
                Ok(0) | Err(NetError::Timeout) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(if buf.is_empty() { None } else { Some(buf) })
    }

    async fn send<C: Connection>(&self, conn: &mut C, response: &Response) -> Result<(), HttpError> {
        conn.write_all(response.head().as_bytes()).await?;
        match &response.body {
            ResponseBody::Empty => {}
            ResponseBody::Text(text) => conn.write_all(text.as_bytes()).await?,
            ResponseBody::Bytes(bytes) => conn.write_all(bytes).await?,
            ResponseBody::File { path, len } => self.stream_file(conn, path, *len).await?,
        }
        Ok(())
    }

    /// Copy a file to the socket, holding the file lock per chunk only
    async fn stream_file<C: Connection>(&self, conn: &mut C, path: &str, len: u64) -> Result<(), HttpError> {
        let mut chunk = vec![0u8; self.config.file_chunk.max(1)];
        let mut offset = 0u64;
        while offset < len {
            let want = core::cmp::min(chunk.len() as u64, len - offset) as usize;
            let n = {
                let mut file = self.files.open(path, OpenMode::Read).await?;
                file.seek(offset)?;
                file.read(&mut chunk[..want])?
            };
            if n == 0 {
                crate::log_warn!("{} shrank while streaming", path);
                break;
            }
            conn.write_all(&chunk[..n]).await?;
            offset += n as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{MockConnection, MockListener, MockStorage, ReadStep};
    use alloc::string::String;
    use core::cell::Cell;

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Ep {
        Hello,
        Echo,
        Download,
    }

    #[derive(Default)]
    struct TestService {
        calls: Cell<usize>,
    }

    impl Service for TestService {
        type Endpoint = Ep;

        async fn call(&self, endpoint: Ep, request: &Request) -> Response {
            self.calls.set(self.calls.get() + 1);
            match endpoint {
                Ep::Hello => {
                    embassy_futures::yield_now().await;
                    Response::html(String::from("<p>hello</p>"))
                }
                Ep::Echo => Response::text(String::from(request.arg("q").unwrap_or(""))),
                Ep::Download => Response::file("tracks/big.csv", 1300, super::super::response::TEXT),
            }
        }
    }

    fn server(files: &FileLock<MockStorage>) -> HttpServer<'_, MockStorage, Ep> {
        let mut routes = RouteTable::new();
        routes.add("/", "GET", Ep::Hello).unwrap();
        routes.add("/echo", "get", Ep::Echo).unwrap();
        routes.add("/download", "get", Ep::Download).unwrap();
        HttpServer::new(routes, files, HttpConfig::default())
    }

    #[tokio::test]
    async fn test_routed_request_gets_complete_response() {
        let files = FileLock::new(MockStorage::new());
        let server = server(&files);
        let service = TestService::default();
        let mut conn = MockConnection::with_request(b"GET / HTTP/1.0\r\n\r\n");
        let probe = conn.probe();

        assert_eq!(server.serve_connection(&mut conn, &service).await, Ok(Some(200)));
        assert_eq!(
            probe.written_text(),
            "HTTP/1.0 200 OK\r\nContent-Type: text/html; encoding=utf8\r\nContent-Length: 12\r\nConnection: close\r\n\r\n<p>hello</p>"
        );
        assert!(probe.is_closed());
    }

    #[tokio::test]
    async fn test_request_accumulates_across_reads() {
        let files = FileLock::new(MockStorage::new());
        let server = server(&files);
        let service = TestService::default();
        let mut conn = MockConnection::new();
        conn.push(ReadStep::Data(b"GET /echo?q=a%20b HT".to_vec()));
        conn.push(ReadStep::Data(b"TP/1.0\r\n\r\n".to_vec()));
        let probe = conn.probe();

        assert_eq!(server.serve_connection(&mut conn, &service).await, Ok(Some(200)));
        assert!(probe.written_text().ends_with("\r\n\r\na%20b"));
        assert_eq!(conn.timeouts_seen(), &[500, 500, 500]);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404_without_calling_service() {
        let files = FileLock::new(MockStorage::new());
        let server = server(&files);
        let service = TestService::default();
        let mut conn = MockConnection::with_request(b"POST / HTTP/1.0\r\n\r\n");
        let probe = conn.probe();

        assert_eq!(server.serve_connection(&mut conn, &service).await, Ok(Some(404)));
        assert!(probe.written_text().starts_with("HTTP/1.0 404 Not Found\r\n"));
        assert_eq!(service.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_silent_client_is_dropped_without_response() {
        let files = FileLock::new(MockStorage::new());
        let server = server(&files);
        let mut conn = MockConnection::new();
        let probe = conn.probe();

        assert_eq!(
            server.serve_connection(&mut conn, &TestService::default()).await,
            Ok(None)
        );
        assert!(probe.written().is_empty());
        assert!(probe.is_closed());
    }

    #[tokio::test]
    async fn test_malformed_request_drops_connection() {
        let files = FileLock::new(MockStorage::new());
        let server = server(&files);
        let mut conn = MockConnection::with_request(b"garbage\r\n\r\n");
        let probe = conn.probe();

        assert_eq!(
            server.serve_connection(&mut conn, &TestService::default()).await,
            Err(HttpError::Malformed("bad request line"))
        );
        assert!(probe.written().is_empty());
        assert!(probe.is_closed());
    }

    #[tokio::test]
    async fn test_reset_mid_request_drops_connection() {
        let files = FileLock::new(MockStorage::new());
        let server = server(&files);
        let mut conn = MockConnection::new();
        conn.push(ReadStep::Data(b"GET / HTTP/1.0\r\n".to_vec()));
        conn.push(ReadStep::Reset);
        let probe = conn.probe();

        assert_eq!(
            server.serve_connection(&mut conn, &TestService::default()).await,
            Err(HttpError::Net(NetError::ConnectionReset))
        );
        assert!(probe.is_closed());
    }

    #[tokio::test]
    async fn test_file_streamed_in_chunks() {
        let storage = MockStorage::new();
        let content: Vec<u8> = (0..1300u32).map(|i| b'a' + (i % 26) as u8).collect();
        storage.insert_file("tracks/big.csv", &content);
        let files = FileLock::new(storage.clone());
        let server = server(&files);
        let mut conn = MockConnection::with_request(b"GET /download HTTP/1.0\r\n\r\n");
        let probe = conn.probe();

        assert_eq!(
            server.serve_connection(&mut conn, &TestService::default()).await,
            Ok(Some(200))
        );
        let written = probe.written();
        let body_start = written.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
        assert_eq!(&written[body_start..], &content[..]);
        assert!(!files.is_locked());
        assert_eq!(storage.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_run_serves_queued_clients() {
        let files = FileLock::new(MockStorage::new());
        let server = server(&files);
        let service = TestService::default();
        let mut listener = MockListener::new();
        let first = MockConnection::with_request(b"GET / HTTP/1.0\r\n\r\n");
        let second = MockConnection::with_request(b"GET /missing HTTP/1.0\r\n\r\n");
        let (p1, p2) = (first.probe(), second.probe());
        listener.push(first);
        listener.push(second);

        // run() never returns; stop once the queue is drained
        let done = async {
            while !(p1.is_closed() && p2.is_closed()) {
                embassy_futures::yield_now().await;
            }
        };
        embassy_futures::select::select(server.run(&mut listener, &service), done).await;

        assert!(p1.written_text().starts_with("HTTP/1.0 200 OK"));
        assert!(p2.written_text().starts_with("HTTP/1.0 404 Not Found"));
    }
}
