//! Minimal HTTP/1.0 server
//!
//! One request per connection, handled to completion before the next
//! connection is accepted:
//!
//! 1. accumulate bytes until a read times out (the normal end of a request)
//! 2. parse the buffer into a [`Request`]
//! 3. route on (path, method); a miss is a fixed 404
//! 4. write status line, headers, blank line and body, then close
//!
//! There is no keep-alive, no chunked encoding and no percent-decoding at
//! this layer; handlers decode form values with [`request::url_decode`].

pub mod request;
pub mod response;
pub mod router;
pub mod server;

pub use request::{parse_query, url_decode, Request, RequestBody};
pub use response::{Response, ResponseBody};
pub use router::{RouteError, RouteTable};
pub use server::{HttpServer, Service};

use crate::platform::error::{NetError, StorageError};
use core::fmt;

/// Errors that end a connection without a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HttpError {
    /// Request could not be parsed
    Malformed(&'static str),
    /// Socket failure
    Net(NetError),
    /// File streaming failed mid-response
    Storage(StorageError),
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::Malformed(reason) => write!(f, "malformed request: {}", reason),
            HttpError::Net(e) => write!(f, "network error: {}", e),
            HttpError::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl From<NetError> for HttpError {
    fn from(e: NetError) -> Self {
        HttpError::Net(e)
    }
}

impl From<StorageError> for HttpError {
    fn from(e: StorageError) -> Self {
        HttpError::Storage(e)
    }
}
