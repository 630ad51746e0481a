//! HTTP application server.
//!
//! This module holds everything between the socket and the handler: the
//! response model, middleware chain, lifecycle hooks, per-connection state
//! machine and the accept loop that owns all connection tasks.

mod response;
mod config;
mod error;
mod handler;
mod middleware;
mod hooks;
mod dispatch;
mod connection;
mod http_server;
mod application;

// Re-export public items
pub use response::{json_response, Body, BodySender, BodyStream, HttpResponse, StatusCode};
pub use config::ServerConfig;
pub use error::Error;
pub use handler::{handler_fn, HandlerFn, HandlerFuture};
pub use middleware::{access_log, build_chain, middleware_fn, MiddlewareFn, Next};
pub use hooks::{hook_fn, HookFn, HookFuture, Hooks};
pub use application::{AppHandle, Application, Phase, Stats};
