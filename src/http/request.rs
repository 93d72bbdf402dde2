//! Request parsing
//!
//! ```text
//! POST /track?x=1 HTTP/1.0\r\n      request line: METHOD PATH PROTOCOL
//! Host: 192.168.4.1\r\n             headers: "Key: Value", one per line
//! \r\n                              first blank line ends the head
//! filename=test&                    body, text or binary
//! ```
//!
//! The head must be UTF-8. The body is kept as text when it decodes and as
//! raw bytes otherwise (file uploads). Query values are split but not
//! percent-decoded.

use super::HttpError;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// Request payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Text(String),
    Binary(Vec<u8>),
}

impl RequestBody {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RequestBody::Text(text) => text.as_bytes(),
            RequestBody::Binary(bytes) => bytes,
        }
    }

    /// The body as text, if it decoded as UTF-8
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RequestBody::Text(text) => Some(text),
            RequestBody::Binary(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// A parsed request, immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Lower-cased method
    pub method: String,
    /// Path without the query, always ending in `/`
    pub path: String,
    pub protocol: String,
    /// Raw (undecoded) query arguments
    pub query: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub body: RequestBody,
}

impl Request {
    /// Parse an accumulated request buffer
    pub fn parse(buf: &[u8]) -> Result<Self, HttpError> {
        let (head, body) = split_head(buf);
        let head =
            core::str::from_utf8(head).map_err(|_| HttpError::Malformed("request head is not UTF-8"))?;

        let mut lines = head.lines();
        let request_line = lines
            .next()
            .ok_or(HttpError::Malformed("empty request"))?;
        let mut parts = request_line.split(' ');
        let (Some(method), Some(target), Some(protocol), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(HttpError::Malformed("bad request line"));
        };

        let mut headers = BTreeMap::new();
        for line in lines.filter(|line| !line.is_empty()) {
            let (key, value) = line
                .split_once(": ")
                .ok_or(HttpError::Malformed("bad header line"))?;
            headers.insert(key.to_string(), value.to_string());
        }

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, BTreeMap::new()),
        };

        let body = match core::str::from_utf8(body) {
            Ok(text) => RequestBody::Text(text.to_string()),
            Err(_) => RequestBody::Binary(body.to_vec()),
        };

        Ok(Self {
            method: method.to_ascii_lowercase(),
            path: canonical_path(path),
            protocol: protocol.to_string(),
            query,
            headers,
            body,
        })
    }

    /// Raw query argument
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Form fields of a url-encoded text body, undecoded
    pub fn form(&self) -> BTreeMap<String, String> {
        self.body.as_text().map(parse_query).unwrap_or_default()
    }
}

/// Split `buf` at the first blank line
///
/// The blank line is `\r\n\r\n` or a bare `\n\n`, whichever comes first;
/// without any separator the whole buffer is the head.
fn split_head(buf: &[u8]) -> (&[u8], &[u8]) {
    let first = [&b"\r\n\r\n"[..], &b"\n\n"[..]]
        .into_iter()
        .filter_map(|separator| find(buf, separator).map(|at| (at, separator.len())))
        .min_by_key(|&(at, _)| at);
    match first {
        Some((at, len)) => (&buf[..at], &buf[at + len..]),
        None => (buf, &[]),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Path with a trailing `/`
pub fn canonical_path(path: &str) -> String {
    let mut path = path.to_string();
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

/// Split `a=1&b=2` into pairs
///
/// Empty segments are skipped and a segment without `=` maps to an empty
/// value. Values are not decoded.
pub fn parse_query(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (segment.to_string(), String::new()),
        })
        .collect()
}

/// Decode a form value: `+` → space, `%xx` → byte
///
/// Malformed escapes are kept as-is; invalid UTF-8 is replaced.
pub fn url_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => match bytes
                .get(i + 1..i + 3)
                .and_then(|pair| hex_pair(pair[0], pair[1]))
            {
                Some(byte) => {
                    out.push(byte);
                    i += 2;
                }
                None => out.push(b'%'),
            },
            other => out.push(other),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_pair(high: u8, low: u8) -> Option<u8> {
    let digit = |c: u8| (c as char).to_digit(16);
    Some((digit(high)? * 16 + digit(low)?) as u8)
}
