//! Server configuration.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use crate::server::error::Error;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address to bind to.
    pub addr: SocketAddr,
    /// The maximum number of concurrent connections.
    pub max_connections: usize,
    /// The read buffer size.
    pub read_buffer_size: usize,
    /// Upper bound on the request line plus headers.
    pub max_head_size: usize,
    /// Upper bound on a request body.
    pub max_body_size: usize,
    /// How long to wait for a complete request before closing the connection.
    pub read_timeout: Duration,
    /// How long a handler (with its middlewares) may run before a 504 is sent.
    pub request_timeout: Duration,
    /// How long in-flight connections get to finish once shutdown begins.
    pub shutdown_grace_period: Duration,
    /// Whether connections may be reused for several requests.
    pub keep_alive: bool,
    /// Resolve `/a/` as `/a`.
    pub normalize_trailing_slash: bool,
}

impl ServerConfig {
    /// Default configuration bound to `host:port`.
    pub fn new(host: &str, port: u16) -> Result<Self, Error> {
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::InternalError(format!("{host}:{port} did not resolve to an address")))?;

        Ok(Self {
            addr,
            ..Self::default()
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 1024,
            read_buffer_size: 8192,
            max_head_size: 16 * 1024,
            max_body_size: 1024 * 1024,
            read_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            shutdown_grace_period: Duration::from_secs(30),
            keep_alive: true,
            normalize_trailing_slash: false,
        }
    }
}
