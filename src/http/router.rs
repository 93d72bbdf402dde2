//! Route table
//!
//! Maps (canonical path, lower-cased method) to an endpoint. Built once at
//! startup; registering the same key again replaces the earlier endpoint.

use super::request::canonical_path;
use alloc::string::String;
use core::fmt;

/// Default route capacity
pub const MAX_ROUTES: usize = 16;

/// Route registration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RouteError {
    /// Table capacity exceeded
    Full,
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::Full => write!(f, "route table full"),
        }
    }
}

struct Route<E> {
    path: String,
    method: String,
    endpoint: E,
}

/// Fixed-capacity route table
pub struct RouteTable<E: Copy, const N: usize = MAX_ROUTES> {
    routes: heapless::Vec<Route<E>, N>,
}

impl<E: Copy, const N: usize> RouteTable<E, N> {
    pub fn new() -> Self {
        Self {
            routes: heapless::Vec::new(),
        }
    }

    /// Register `endpoint` for `method` on `path`
    pub fn add(&mut self, path: &str, method: &str, endpoint: E) -> Result<(), RouteError> {
        let path = canonical_path(path);
        let method = method.to_ascii_lowercase();
        if let Some(route) = self
            .routes
            .iter_mut()
            .find(|r| r.path == path && r.method == method)
        {
            route.endpoint = endpoint;
            return Ok(());
        }
        self.routes
            .push(Route {
                path,
                method,
                endpoint,
            })
            .map_err(|_| RouteError::Full)
    }

    /// Endpoint for a parsed request's path and method
    pub fn lookup(&self, path: &str, method: &str) -> Option<E> {
        self.routes
            .iter()
            .find(|r| r.path == path && r.method == method)
            .map(|r| r.endpoint)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<E: Copy, const N: usize> Default for RouteTable<E, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_canonicalized() {
        let mut routes: RouteTable<u8> = RouteTable::new();
        routes.add("/track", "POST", 1).unwrap();
        assert_eq!(routes.lookup("/track/", "post"), Some(1));
        assert_eq!(routes.lookup("/track/", "get"), None);
        assert_eq!(routes.lookup("/track", "post"), None);
    }

    #[test]
    fn test_last_registration_wins() {
        let mut routes: RouteTable<u8> = RouteTable::new();
        routes.add("/", "get", 1).unwrap();
        routes.add("/", "GET", 2).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes.lookup("/", "get"), Some(2));
    }

    #[test]
    fn test_capacity() {
        let mut routes: RouteTable<u8, 2> = RouteTable::new();
        routes.add("/a", "get", 1).unwrap();
        routes.add("/b", "get", 2).unwrap();
        assert_eq!(routes.add("/c", "get", 3), Err(RouteError::Full));
        assert_eq!(routes.add("/a", "get", 4), Ok(()));
    }
}
