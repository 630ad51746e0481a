//! Middleware chain.
//!
//! A middleware receives the request together with a [`Next`] that runs the
//! rest of the chain. It may call `next` once and return (or transform) its
//! result, return a response of its own without calling `next`, or fail.
//!
//! Middlewares nest in registration order: the first registered is the
//! outermost, so it sees the request first and the response last.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};

use crate::parser::HttpRequest;
use crate::server::error::Error;
use crate::server::handler::{HandlerFn, HandlerFuture};

/// Type alias for a middleware function.
pub type MiddlewareFn = Arc<dyn Fn(HttpRequest, Next) -> HandlerFuture + Send + Sync>;

/// Counts `next` being run more than once anywhere in one chain.
///
/// A middleware may swallow the error its second call returns, so the
/// dispatcher consults this after the chain finishes.
#[derive(Clone, Default)]
pub(crate) struct ContractGuard(Arc<AtomicUsize>);

impl ContractGuard {
    fn record(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn violations(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// The remainder of the chain, as seen by one middleware invocation.
///
/// Cloning shares the same one-shot guard: across all clones, only the first
/// `run` reaches the inner handler.
#[derive(Clone)]
pub struct Next {
    inner: HandlerFn,
    called: Arc<AtomicBool>,
    guard: ContractGuard,
}

impl Next {
    fn new(inner: HandlerFn, guard: ContractGuard) -> Self {
        Self {
            inner,
            called: Arc::new(AtomicBool::new(false)),
            guard,
        }
    }

    /// Run the rest of the chain.
    ///
    /// A second call fails with [`Error::MiddlewareContract`] without running
    /// anything. The violation is recorded even if the caller drops that error.
    pub fn run(&self, req: HttpRequest) -> HandlerFuture {
        if self.called.swap(true, Ordering::SeqCst) {
            self.guard.record();
            let path = req.path;
            return Box::pin(async move {
                Err(Error::MiddlewareContract(format!("next called more than once for {path}")))
            });
        }
        (self.inner)(req)
    }
}

/// Box an async function into a [`MiddlewareFn`].
pub fn middleware_fn<F, Fut>(middleware: F) -> MiddlewareFn
where
    F: Fn(HttpRequest, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<crate::server::HttpResponse, Error>> + Send + 'static,
{
    Arc::new(move |req: HttpRequest, next: Next| -> HandlerFuture { Box::pin(middleware(req, next)) })
}

/// Wrap `handler` in `middlewares`, first one outermost.
///
/// Building the chain has no side effects; each invocation of the returned
/// handler hands every middleware a fresh [`Next`].
pub fn build_chain(handler: HandlerFn, middlewares: &[MiddlewareFn]) -> HandlerFn {
    build_guarded_chain(handler, middlewares, &ContractGuard::default())
}

/// Like [`build_chain`], with every [`Next`] reporting repeated calls to `guard`.
pub(crate) fn build_guarded_chain(handler: HandlerFn, middlewares: &[MiddlewareFn], guard: &ContractGuard) -> HandlerFn {
    middlewares.iter().rev().fold(handler, |inner, middleware| {
        let middleware = Arc::clone(middleware);
        let guard = guard.clone();
        Arc::new(move |req: HttpRequest| -> HandlerFuture {
            middleware(req, Next::new(Arc::clone(&inner), guard.clone()))
        })
    })
}

/// Logs `METHOD target -> status (latency)` for every request.
///
/// Failures are logged with the status they will be translated to and then
/// passed on unchanged.
pub fn access_log() -> MiddlewareFn {
    middleware_fn(|req: HttpRequest, next: Next| async move {
        let started = Instant::now();
        let method = req.method;
        let target = req.path.clone();

        let result = next.run(req).await;
        let elapsed = started.elapsed();
        match &result {
            Ok(response) => info!("{method} {target} -> {} ({elapsed:?})", response.status.as_u16()),
            Err(e) => warn!("{method} {target} -> {} ({elapsed:?}): {e}", e.status().as_u16()),
        }
        result
    })
}
