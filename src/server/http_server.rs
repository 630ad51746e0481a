//! The accept loop and the set of live connection tasks.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time;

use crate::server::application::{shutdown_requested, AppHandle, Phase};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::server::dispatch::Dispatcher;
use crate::server::error::Error;
use crate::server::response::{HttpResponse, StatusCode};

/// Accepts connections and owns one task per open connection.
pub(crate) struct HttpServer {
    dispatcher: Arc<Dispatcher>,
    config: Arc<ServerConfig>,
    app: AppHandle,
}

impl HttpServer {
    pub(crate) fn new(dispatcher: Arc<Dispatcher>, config: Arc<ServerConfig>, app: AppHandle) -> Self {
        Self {
            dispatcher,
            config,
            app,
        }
    }

    /// Handle a new connection.
    async fn handle_new_connection(
        &self,
        mut socket: TcpStream,
        addr: SocketAddr,
        semaphore: &Arc<Semaphore>,
        tasks: &mut JoinSet<()>,
    ) {
        let permit = match Arc::clone(semaphore).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Connection limit reached, rejecting connection from {addr}");
                let response = HttpResponse::new(StatusCode::ServiceUnavailable)
                    .with_content_type("text/plain")
                    .with_header("Connection", "close")
                    .with_body_string("Server is at capacity, please try again later");
                if let Err(e) = socket.write_all(&response.to_bytes()).await {
                    debug!("Could not send 503 to {addr}: {e}");
                }
                return;
            }
        };

        debug!("Accepted connection from {addr}");
        let open = self.app.connection_opened();
        let connection = Connection::new(
            socket,
            Some(addr),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.config),
            self.app.clone(),
        );

        tasks.spawn(async move {
            // Both are released when the task ends, including on abort.
            let _permit = permit;
            let _open = open;

            match connection.run().await {
                Ok(()) => debug!("Connection from {addr} closed"),
                Err(Error::IoError(e)) => debug!("Connection from {addr} dropped: {e}"),
                Err(e) => warn!("Connection from {addr} closed with error: {e}"),
            }
        });
    }

    /// Handle connection errors.
    async fn handle_connection_error(e: std::io::Error) -> bool {
        error!("Error accepting connection: {e}");

        if e.kind() == std::io::ErrorKind::BrokenPipe {
            error!("Critical error accepting connection, shutting down");
            return true;
        }

        // Typically descriptor exhaustion; back off before retrying.
        time::sleep(Duration::from_millis(100)).await;
        false
    }

    /// Wait for connections to finish, aborting whatever is left after the grace period.
    async fn perform_shutdown(tasks: &mut JoinSet<()>, grace_period: Duration) {
        info!("Waiting up to {grace_period:?} for {len} active connection(s) to complete...", len = tasks.len());

        let drained = time::timeout(grace_period, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    error!("Connection task failed during shutdown: {e}");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("Grace period elapsed, aborting {len} connection(s)", len = tasks.len());
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
    }

    /// Accept connections until `shutdown_signal` resolves or shutdown is
    /// requested through the [`AppHandle`], then drain.
    pub(crate) async fn serve<S>(&self, listener: TcpListener, shutdown_signal: S)
    where
        S: Future<Output = ()>,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.max_connections));
        let mut shutdown_rx = self.app.subscribe_shutdown();
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown_signal);

        loop {
            tokio::select! {
                _ = &mut shutdown_signal => {
                    info!("Shutting down server...");
                    break;
                }

                _ = shutdown_requested(&mut shutdown_rx) => {
                    info!("Shutdown requested, shutting down server...");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((socket, addr)) => {
                            self.handle_new_connection(socket, addr, &semaphore, &mut tasks).await;
                        }
                        Err(e) => {
                            if Self::handle_connection_error(e).await {
                                break;
                            }
                        }
                    }
                }

                // Reap finished connections as we go.
                Some(res) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = res {
                        error!("Connection task failed: {e}");
                    }
                }
            }
        }

        drop(listener);
        self.app.set_phase(Phase::Stopping);
        // Lets idle keep-alive connections close right away.
        self.app.shutdown();
        Self::perform_shutdown(&mut tasks, self.config.shutdown_grace_period).await;
    }
}
