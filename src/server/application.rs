//! The application: setup API and lifecycle.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use log::{error, info};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;

use crate::parser::{HttpRequest, Method};
use crate::router::RouteTable;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::server::dispatch::Dispatcher;
use crate::server::error::Error;
use crate::server::handler::{handler_fn, HandlerFn};
use crate::server::hooks::{hook_fn, Hooks};
use crate::server::http_server::HttpServer;
use crate::server::middleware::{middleware_fn, MiddlewareFn, Next};
use crate::server::response::HttpResponse;

/// Lifecycle phase of an [`Application`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Routes, middlewares and hooks may be registered.
    Setup,
    /// Startup hooks are running.
    Starting,
    /// Accepting connections.
    Running,
    /// No longer accepting; draining connections and running shutdown hooks.
    Stopping,
    /// Done. A failed startup also ends here.
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Setup => "in setup",
            Phase::Starting => "starting",
            Phase::Running => "running",
            Phase::Stopping => "stopping",
            Phase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Counters shared by every connection of an application.
///
/// Plain atomics: handlers are `Send`, so the application may be served from
/// a multi-threaded runtime as well as the single-threaded one `run` builds.
#[derive(Debug, Default)]
pub struct Stats {
    connections_accepted: AtomicU64,
    open_connections: AtomicUsize,
    requests_served: AtomicU64,
}

impl Stats {
    pub fn connections_accepted(&self) -> u64 {
        self.connections_accepted.load(Ordering::Relaxed)
    }

    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::Relaxed)
    }

    pub fn requests_served(&self) -> u64 {
        self.requests_served.load(Ordering::Relaxed)
    }

    pub(crate) fn record_request(&self) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
    }
}

/// Keeps `open_connections` accurate even when a connection task is aborted.
pub(crate) struct OpenConnection(AppHandle);

impl Drop for OpenConnection {
    fn drop(&mut self) {
        self.0.inner.stats.open_connections.fetch_sub(1, Ordering::Relaxed);
    }
}

struct Shared {
    phase: watch::Sender<Phase>,
    shutdown: watch::Sender<bool>,
    stats: Stats,
}

/// A cheap, cloneable view of a running application.
///
/// Passed to lifecycle hooks; also useful to stop a server from elsewhere.
#[derive(Clone)]
pub struct AppHandle {
    inner: Arc<Shared>,
}

impl AppHandle {
    fn new() -> Self {
        let (phase, _) = watch::channel(Phase::Setup);
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Shared {
                phase,
                shutdown,
                stats: Stats::default(),
            }),
        }
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> Phase {
        *self.inner.phase.borrow()
    }

    /// Ask the server to stop accepting connections and shut down.
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    pub fn stats(&self) -> &Stats {
        &self.inner.stats
    }

    /// Wait until startup has finished one way or the other.
    ///
    /// Returns the phase observed at that point: `Running` (or later) when
    /// startup succeeded, `Stopped` when it failed.
    pub async fn started(&self) -> Phase {
        let mut phase = self.inner.phase.subscribe();
        loop {
            let current = *phase.borrow_and_update();
            if current > Phase::Starting {
                return current;
            }
            if phase.changed().await.is_err() {
                return self.phase();
            }
        }
    }

    /// Wait until the application has fully stopped.
    pub async fn stopped(&self) {
        let mut phase = self.inner.phase.subscribe();
        while *phase.borrow_and_update() != Phase::Stopped {
            if phase.changed().await.is_err() {
                return;
            }
        }
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        info!("Application {phase}");
        self.inner.phase.send_replace(phase);
    }

    pub(crate) fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    pub(crate) fn connection_opened(&self) -> OpenConnection {
        self.inner.stats.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.inner.stats.open_connections.fetch_add(1, Ordering::Relaxed);
        OpenConnection(self.clone())
    }
}

/// Resolves once shutdown has been requested. Never resolves if the
/// application is gone without requesting it.
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// An HTTP application.
///
/// Routes, middlewares and lifecycle hooks are registered during setup.
/// Serving freezes them: every registration after [`Application::serve`] has
/// been called fails with [`Error::NotInSetup`].
pub struct Application {
    config: ServerConfig,
    routes: RouteTable<HandlerFn>,
    middlewares: Vec<MiddlewareFn>,
    hooks: Hooks,
    handle: AppHandle,
}

impl Application {
    /// Create an application with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        let mut routes = RouteTable::new();
        routes.set_normalize_trailing_slash(config.normalize_trailing_slash);

        Self {
            config,
            routes,
            middlewares: Vec::new(),
            hooks: Hooks::default(),
            handle: AppHandle::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn handle(&self) -> AppHandle {
        self.handle.clone()
    }

    pub fn phase(&self) -> Phase {
        self.handle.phase()
    }

    /// The registered routes.
    pub fn routes(&self) -> &RouteTable<HandlerFn> {
        &self.routes
    }

    fn ensure_setup(&self) -> Result<(), Error> {
        match self.phase() {
            Phase::Setup => Ok(()),
            phase => Err(Error::NotInSetup(phase)),
        }
    }

    /// Register `handler` for `method` requests matching `pattern`.
    pub fn add_route<F, Fut>(&mut self, method: Method, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add_handler(method, pattern, handler_fn(handler))
    }

    /// Register an already boxed handler.
    pub fn add_handler(&mut self, method: Method, pattern: &str, handler: HandlerFn) -> Result<(), Error> {
        self.ensure_setup()?;
        self.routes.register(method, pattern, handler)?;
        Ok(())
    }

    pub fn get<F, Fut>(&mut self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add_route(Method::GET, pattern, handler)
    }

    pub fn post<F, Fut>(&mut self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add_route(Method::POST, pattern, handler)
    }

    pub fn put<F, Fut>(&mut self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add_route(Method::PUT, pattern, handler)
    }

    pub fn delete<F, Fut>(&mut self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add_route(Method::DELETE, pattern, handler)
    }

    pub fn head<F, Fut>(&mut self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add_route(Method::HEAD, pattern, handler)
    }

    /// Append a middleware. The first one added is the outermost.
    pub fn add_middleware<F, Fut>(&mut self, middleware: F) -> Result<(), Error>
    where
        F: Fn(HttpRequest, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
    {
        self.add_middleware_fn(middleware_fn(middleware))
    }

    /// Append an already boxed middleware.
    pub fn add_middleware_fn(&mut self, middleware: MiddlewareFn) -> Result<(), Error> {
        self.ensure_setup()?;
        self.middlewares.push(middleware);
        Ok(())
    }

    /// Run `hook` before the first connection is accepted.
    pub fn on_startup<F, Fut>(&mut self, hook: F) -> Result<(), Error>
    where
        F: Fn(AppHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.ensure_setup()?;
        self.hooks.on_startup(hook_fn(hook));
        Ok(())
    }

    /// Run `hook` once the server has stopped accepting and drained.
    pub fn on_shutdown<F, Fut>(&mut self, hook: F) -> Result<(), Error>
    where
        F: Fn(AppHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.ensure_setup()?;
        self.hooks.on_shutdown(hook_fn(hook));
        Ok(())
    }

    fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            self.routes.clone(),
            self.middlewares.clone(),
            self.config.request_timeout,
        ))
    }

    /// Serve one already-established connection until it closes.
    ///
    /// Bypasses the accept loop and lifecycle, e.g. for in-memory streams or
    /// a custom acceptor.
    pub async fn serve_connection<S>(&self, io: S) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let _open = self.handle.connection_opened();
        Connection::new(io, None, self.dispatcher(), Arc::new(self.config.clone()), self.handle.clone())
            .run()
            .await
    }

    /// Run startup hooks, accept connections on `listener` until
    /// `shutdown_signal` resolves or [`AppHandle::shutdown`] is called, then
    /// drain connections and run shutdown hooks.
    ///
    /// If a startup hook fails no connection is accepted and its error is
    /// returned. Shutdown hook failures are collected into [`Error::Shutdown`]
    /// after all of them have run.
    pub async fn serve<S>(&mut self, listener: TcpListener, shutdown_signal: S) -> Result<(), Error>
    where
        S: Future<Output = ()>,
    {
        self.ensure_setup()?;
        let handle = self.handle.clone();
        handle.set_phase(Phase::Starting);

        if let Err(e) = self.hooks.run_startup(&handle).await {
            error!("Startup aborted: {e}");
            handle.set_phase(Phase::Stopped);
            return Err(e);
        }

        self.display_server_info();
        let server = HttpServer::new(self.dispatcher(), Arc::new(self.config.clone()), handle.clone());
        match listener.local_addr() {
            Ok(addr) => info!("Server listening on http://{addr}"),
            Err(e) => error!("Listener has no local address: {e}"),
        }
        handle.set_phase(Phase::Running);

        server.serve(listener, shutdown_signal).await;

        let failures = self.hooks.run_shutdown(&handle).await;
        handle.set_phase(Phase::Stopped);
        info!("Server shutdown complete");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Shutdown(failures))
        }
    }

    /// Bind `config.addr` and serve on a single-threaded runtime until Ctrl+C.
    pub fn run(&mut self) -> Result<(), Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        runtime.block_on(async {
            let listener = TcpListener::bind(self.config.addr).await?;
            self.serve(listener, ctrl_c()).await
        })
    }

    fn display_server_info(&self) {
        info!("Registered endpoints:");
        for route in self.routes.routes() {
            info!("  {} {}", route.method, route.pattern);
        }
        if !self.middlewares.is_empty() {
            info!("{} middleware(s) installed", self.middlewares.len());
        }
        info!(
            "{} startup hook(s), {} shutdown hook(s)",
            self.hooks.startup_len(),
            self.hooks.shutdown_len()
        );
    }
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
        Err(e) => {
            error!("Error setting up Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    }
}
