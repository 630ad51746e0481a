//! HTTP parser module.
//!
//! This module provides the request model and the HTTP/1.x decoding that turns
//! bytes read off a connection into complete requests.

mod request;
mod method;
mod version;
mod error;
mod framing;

// Re-export public items
pub use request::HttpRequest;
pub use method::Method;
pub use version::HttpVersion;
pub use error::Error;
pub use framing::RequestDecoder;

// Re-export the parse_request function
pub use request::parse_request;
pub(crate) use request::parse_headers;
