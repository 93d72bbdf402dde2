//! Response building and serialization
//!
//! Every response is HTTP/1.0 with `Content-Length` and
//! `Connection: close`. File bodies are not held in memory; the server
//! streams them from storage after writing the head.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// Content type of generated pages
pub const HTML: &str = "text/html; encoding=utf8";
/// Content type of plain-text replies and downloads
pub const TEXT: &str = "text/plain; encoding=utf8";
/// Content type of JSON downloads
pub const JSON: &str = "application/json";

/// Response payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Empty,
    Text(String),
    Bytes(Vec<u8>),
    /// Streamed from storage; `len` is the size at the time of the handler
    File { path: String, len: u64 },
}

impl ResponseBody {
    pub fn len(&self) -> u64 {
        match self {
            ResponseBody::Empty => 0,
            ResponseBody::Text(text) => text.len() as u64,
            ResponseBody::Bytes(bytes) => bytes.len() as u64,
            ResponseBody::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A complete response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub reason: &'static str,
    pub content_type: &'static str,
    /// Extra headers, written in order
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
}

impl Response {
    fn new(status: u16, reason: &'static str, content_type: &'static str, body: ResponseBody) -> Self {
        Self {
            status,
            reason,
            content_type,
            headers: Vec::new(),
            body,
        }
    }

    /// 200 with an HTML document
    pub fn html(document: String) -> Self {
        Self::new(200, "OK", HTML, ResponseBody::Text(document))
    }

    /// 200 with plain text
    pub fn text(text: String) -> Self {
        Self::new(200, "OK", TEXT, ResponseBody::Text(text))
    }

    /// The fixed reply for unknown routes and files
    pub fn not_found() -> Self {
        Self::new(404, "Not Found", HTML, ResponseBody::Text(String::from("404")))
    }

    /// 400 with a short explanation
    pub fn bad_request(reason: &str) -> Self {
        Self::new(400, "Bad Request", TEXT, ResponseBody::Text(reason.to_string()))
    }

    /// 303 to `location`, used after form posts
    pub fn redirect(location: &str) -> Self {
        Self::new(303, "See Other", HTML, ResponseBody::Empty).with_header("Location", location)
    }

    /// 200 streaming `path` from storage
    pub fn file(path: &str, len: u64, content_type: &'static str) -> Self {
        Self::new(
            200,
            "OK",
            content_type,
            ResponseBody::File {
                path: path.to_string(),
                len,
            },
        )
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    /// Status line, headers and the blank separator line
    pub fn head(&self) -> String {
        let mut head = format!(
            "HTTP/1.0 {} {}\r\nContent-Type: {}\r\n",
            self.status, self.reason, self.content_type
        );
        for (key, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", key, value));
        }
        head.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n",
            self.body.len()
        ));
        head
    }
}
