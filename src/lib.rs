//! A minimal asynchronous HTTP application framework.
//!
//! An [`Application`] owns a routing table, an ordered middleware chain and
//! startup/shutdown hooks. Serving it accepts connections, reads HTTP/1.x
//! requests off each one, resolves the handler for every request, runs it
//! through the middleware chain and writes the response back, reusing the
//! connection while the client keeps it alive.
//!
//! # Features
//!
//! - Path patterns with variable segments (`/users/{id}`), literal segments
//!   preferred over variables
//! - Distinct `404 Not Found` and `405 Method Not Allowed` outcomes
//! - Middlewares that can inspect, short-circuit, or post-process
//! - Startup and shutdown hooks
//! - Keep-alive, pipelining, `Content-Length` and chunked bodies
//! - Read and handler timeouts, graceful shutdown with a grace period
//!
//! # Examples
//!
//! ## Routing with path parameters
//!
//! ```no_run
//! use sketch::{Application, HttpResponse, ServerConfig, StatusCode};
//!
//! fn main() -> Result<(), sketch::ServerError> {
//!     let mut app = Application::new(ServerConfig::new("127.0.0.1", 8080)?);
//!
//!     app.get("/{username}", |req| async move {
//!         let username = req.param("username").unwrap_or_default().to_string();
//!         Ok(HttpResponse::new(StatusCode::Ok).with_body_string(format!("Hello, {username}")))
//!     })?;
//!
//!     app.run()
//! }
//! ```
//!
//! ## Middleware
//!
//! ```
//! use sketch::{Application, HttpResponse, Next, ServerConfig, StatusCode};
//!
//! let mut app = Application::new(ServerConfig::default());
//!
//! // Reject requests without an API key before they reach any handler.
//! app.add_middleware(|req: sketch::HttpRequest, next: Next| async move {
//!     if !req.has_header("X-Api-Key") {
//!         return Ok(HttpResponse::new(StatusCode::Unauthorized));
//!     }
//!     next.run(req).await
//! }).unwrap();
//! ```
//!
//! ## Parsing requests
//!
//! ```
//! use sketch::{parse_request, Method};
//!
//! let request = parse_request(b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n").unwrap();
//! assert_eq!(request.method, Method::GET);
//! assert_eq!(request.get_header("host").unwrap(), "example.com");
//! ```

// Export the parser module
pub mod parser;

// Export the router module
pub mod router;

// Export the server module
pub mod server;

// Re-export commonly used items for convenience
pub use parser::{Error as ParserError, HttpRequest, HttpVersion, Method, RequestDecoder, parse_request};
pub use router::{Error as RouterError, MatchResult, Pattern, RouteTable};
pub use server::{
    AppHandle, Application, Error as ServerError, HttpResponse, Next, Phase, ServerConfig, StatusCode,
    access_log, json_response,
};
