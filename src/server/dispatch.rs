//! Per-request dispatch: routing, middleware chain, handler, error translation.

use std::any::Any;
use std::time::Duration;

use log::{debug, error};
use tokio::task::{JoinError, JoinHandle};
use tokio::time;

use crate::parser::HttpRequest;
use crate::router::RouteTable;
use crate::server::error::Error;
use crate::server::handler::{self, HandlerFn};
use crate::server::middleware::{build_guarded_chain, ContractGuard, MiddlewareFn};
use crate::server::response::HttpResponse;

/// The frozen routing table and middleware sequence of a running application.
pub(crate) struct Dispatcher {
    routes: RouteTable<HandlerFn>,
    middlewares: Vec<MiddlewareFn>,
    request_timeout: Duration,
}

impl Dispatcher {
    pub(crate) fn new(routes: RouteTable<HandlerFn>, middlewares: Vec<MiddlewareFn>, request_timeout: Duration) -> Self {
        Self {
            routes,
            middlewares,
            request_timeout,
        }
    }

    /// Produce the response for `req`. Never fails: errors, panics and
    /// timeouts are all turned into responses here.
    pub(crate) async fn dispatch(&self, mut req: HttpRequest) -> HttpResponse {
        let method = req.method;
        let target = req.path.clone();

        let endpoint = match self.routes.resolve(req.method, req.raw_path()) {
            Ok(matched) => {
                req.set_match_info(matched.path_params);
                matched.handler
            }
            Err(e) => {
                debug!("{method} {target}: {e}");
                handler::failing(e)
            }
        };

        // Run on its own task so a panic stays contained to this request.
        let guard = ContractGuard::default();
        let chain = build_guarded_chain(endpoint, &self.middlewares, &guard);
        let mut task = AbortOnDrop(tokio::spawn(chain(req)));

        let result = match time::timeout(self.request_timeout, &mut task.0).await {
            Ok(Ok(result)) => enforce_contract(result, &guard, &target),
            Ok(Err(join_error)) => Err(Error::HandlerPanicked(panic_message(join_error))),
            Err(_) => Err(Error::Timeout(self.request_timeout)),
        };

        match result {
            Ok(response) => response,
            Err(e) => {
                if e.is_server_fault() {
                    error!("{method} {target} failed: {e}");
                } else {
                    debug!("{method} {target} failed: {e}");
                }
                e.to_response()
            }
        }
    }
}

/// A chain that ran some `next` twice fails, whatever it returned.
fn enforce_contract(
    result: Result<HttpResponse, Error>,
    guard: &ContractGuard,
    target: &str,
) -> Result<HttpResponse, Error> {
    match (guard.violations(), result) {
        (0, result) => result,
        (_, Err(e @ Error::MiddlewareContract(_))) => Err(e),
        (violations, _) => Err(Error::MiddlewareContract(format!(
            "next called more than once ({violations} extra call(s)) for {target}"
        ))),
    }
}

/// Aborts the handler task when the connection stops waiting for it.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn panic_message(join_error: JoinError) -> String {
    if !join_error.is_panic() {
        return join_error.to_string();
    }
    let payload: Box<dyn Any + Send> = join_error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
