//! HTTP request handlers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::parser::HttpRequest;
use crate::server::{HttpResponse, Error};

/// Type alias for a boxed future that returns a Result<HttpResponse, Error>.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>;

/// Type alias for a handler function that takes an HttpRequest and returns a HandlerFuture.
pub type HandlerFn = Arc<dyn Fn(HttpRequest) -> HandlerFuture + Send + Sync>;

/// Box an async function into a [`HandlerFn`].
pub fn handler_fn<F, Fut>(handler: F) -> HandlerFn
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    Arc::new(move |req: HttpRequest| -> HandlerFuture { Box::pin(handler(req)) })
}

/// A handler that always fails with `error`.
///
/// Used as the innermost link when routing fails, so middlewares still get
/// the chance to intercept the routing error.
pub(crate) fn failing(error: crate::router::Error) -> HandlerFn {
    Arc::new(move |_req: HttpRequest| -> HandlerFuture {
        let error = error.clone();
        Box::pin(async move { Err(Error::Routing(error)) })
    })
}
