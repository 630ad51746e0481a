//! One client connection, from accept to close.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::time::{self, Instant};

use crate::parser::{HttpRequest, HttpVersion, Method, RequestDecoder};
use crate::server::application::{shutdown_requested, AppHandle};
use crate::server::config::ServerConfig;
use crate::server::dispatch::Dispatcher;
use crate::server::error::Error;

/// Where a connection is in its request/response cycle.
///
/// `Closing` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    Accepted,
    ReadingRequest,
    Dispatching,
    WritingResponse,
    Closing,
}

struct Peer(Option<SocketAddr>);

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(addr) => write!(f, "{addr}"),
            None => f.write_str("<local>"),
        }
    }
}

/// Drives a single connection: reads requests in order, dispatches each one,
/// writes its response, and either loops for the next request (keep-alive)
/// or closes.
pub(crate) struct Connection<S> {
    io: S,
    peer: Peer,
    state: ConnectionState,
    decoder: RequestDecoder,
    dispatcher: Arc<Dispatcher>,
    config: Arc<ServerConfig>,
    app: AppHandle,
    shutdown: watch::Receiver<bool>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(
        io: S,
        peer: Option<SocketAddr>,
        dispatcher: Arc<Dispatcher>,
        config: Arc<ServerConfig>,
        app: AppHandle,
    ) -> Self {
        Self {
            io,
            peer: Peer(peer),
            state: ConnectionState::Accepted,
            decoder: RequestDecoder::new(config.max_head_size, config.max_body_size),
            dispatcher,
            shutdown: app.subscribe_shutdown(),
            config,
            app,
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        trace!("{}: {:?} -> {:?}", self.peer, self.state, next);
        self.state = next;
    }

    /// Serve the connection until it closes.
    ///
    /// Errors are reported for logging only; whatever could still be
    /// answered has been answered.
    pub(crate) async fn run(mut self) -> Result<(), Error> {
        let result = self.serve_requests().await;
        self.transition(ConnectionState::Closing);
        if let Err(e) = self.io.shutdown().await {
            trace!("{}: shutdown failed: {e}", self.peer);
        }
        result
    }

    async fn serve_requests(&mut self) -> Result<(), Error> {
        let mut buf = vec![0; self.config.read_buffer_size.max(1)];
        self.transition(ConnectionState::ReadingRequest);

        loop {
            let request = match self.read_request(&mut buf).await {
                Ok(Some(request)) => request,
                Ok(None) => return Ok(()),
                Err(e @ Error::ParseError(_)) => {
                    debug!("{}: malformed request: {e}", self.peer);
                    let mut response = e.to_response();
                    response.set_header("Connection", "close");
                    self.transition(ConnectionState::WritingResponse);
                    response.write_to(&mut self.io, false, true).await?;
                    return Err(e);
                }
                Err(e) => return Err(e),
            };

            self.transition(ConnectionState::Dispatching);
            let head_only = request.method == Method::HEAD;
            let version = request.version;
            let client_keep_alive = self.config.keep_alive && request.wants_keep_alive();

            let mut response = self.dispatcher.dispatch(request).await;
            self.app.stats().record_request();

            let chunked_allowed = version == HttpVersion::Http11;
            let handler_close = response
                .header("Connection")
                .map(|value| value.eq_ignore_ascii_case("close"))
                .unwrap_or(false);
            // Without chunked framing a streamed body can only end by closing.
            let keep_alive = client_keep_alive
                && !handler_close
                && !self.app.is_shutting_down()
                && (chunked_allowed || !response.is_streaming());

            if !keep_alive {
                response.set_header("Connection", "close");
            } else if version == HttpVersion::Http10 {
                response.set_header("Connection", "keep-alive");
            }

            self.transition(ConnectionState::WritingResponse);
            response.write_to(&mut self.io, head_only, chunked_allowed).await?;

            if !keep_alive {
                return Ok(());
            }
            self.transition(ConnectionState::ReadingRequest);
        }
    }

    /// Read until a complete request is buffered.
    ///
    /// `Ok(None)` means the connection should close without a response: the
    /// peer went away, the read timeout expired, or shutdown began while no
    /// request was in progress.
    async fn read_request(&mut self, buf: &mut [u8]) -> Result<Option<HttpRequest>, Error> {
        let deadline = Instant::now() + self.config.read_timeout;

        loop {
            if let Some(request) = self.decoder.decode()? {
                return Ok(Some(request));
            }

            let idle = self.decoder.is_empty();
            let read = tokio::select! {
                result = time::timeout_at(deadline, self.io.read(buf)) => result,
                _ = shutdown_requested(&mut self.shutdown), if idle => {
                    debug!("{}: closing idle connection for shutdown", self.peer);
                    return Ok(None);
                }
            };

            let n = match read {
                Ok(result) => result?,
                Err(_) => {
                    warn!("{}: timed out waiting for a request", self.peer);
                    return Ok(None);
                }
            };

            if n == 0 {
                if !self.decoder.is_empty() {
                    debug!("{}: peer closed mid-request", self.peer);
                }
                return Ok(None);
            }
            self.decoder.feed(&buf[..n]);
        }
    }
}
