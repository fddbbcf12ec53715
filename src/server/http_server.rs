//! Mock server lifecycle.

use std::net::SocketAddr;
use std::sync::{Arc, MutexGuard};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, oneshot, watch};
use tokio::task::JoinSet;

use crate::parser::{HttpRequest, Method};
use crate::recorder::{HistoryRecorder, Recorder, RequestSnapshot};
use crate::server::config::{ServerConfig, ServerOptions};
use crate::server::dispatch::{ConnectionLimits, handle_connection};
use crate::server::error::Error;
use crate::server::handler::{HandlerResult, Reply};
use crate::server::logging::ServerLogger;
use crate::server::response::{HttpResponse, StatusCode};
use crate::server::state::{Phase, Running, ServerState, SharedState, lock_state};

/// An in-process HTTP server answering requests from a queue of one-shot
/// handlers and recording every request it receives.
///
/// `MockServer` is a cheap handle; clones control the same server, so a clone
/// can be moved into a handler that inspects the server.
#[derive(Clone)]
pub struct MockServer {
    config: Arc<ServerConfig>,
    state: SharedState,
}

/// Settings the accept loop needs once it is detached from the server.
#[derive(Clone)]
struct AcceptOptions {
    max_connections: usize,
    limits: ConnectionLimits,
    shutdown_timeout: Duration,
    logger: ServerLogger,
}

impl MockServer {
    /// Create a stopped server with the default configuration.
    pub fn new() -> Self {
        Self::from_config(ServerConfig::default())
    }

    /// Create a server from a port or a configuration.
    ///
    /// If a port is given the server starts listening before this returns,
    /// and a bind failure is returned as the error.
    pub async fn with_options(options: impl Into<ServerOptions>) -> Result<Self, Error> {
        let config = options.into().into_config();
        let port = config.port;
        let server = Self::from_config(config);

        if let Some(port) = port {
            server.listen(port).await?;
            server.logger().info(format_args!("Listen immediately on port: {port}"));
        }

        Ok(server)
    }

    pub(crate) fn from_config(config: ServerConfig) -> Self {
        let logger = ServerLogger::new(config.log_level);
        let state = ServerState::new(logger, config.history_recorder.clone());

        Self {
            config: Arc::new(config),
            state: Arc::new(std::sync::Mutex::new(state)),
        }
    }

    #[cfg(test)]
    pub(crate) fn shared_state(&self) -> &SharedState {
        &self.state
    }

    fn lock_state(&self) -> MutexGuard<'_, ServerState> {
        lock_state(&self.state)
    }

    fn logger(&self) -> ServerLogger {
        self.lock_state().logger.clone()
    }

    /// Start listening on `port` (`0` picks a free port).
    ///
    /// Fails with [`Error::AlreadyListening`], changing nothing, if the
    /// server is listening. Otherwise the server's own request history and
    /// the handler queue are cleared before binding. Returns the bound address.
    pub async fn listen(&self, port: u16) -> Result<SocketAddr, Error> {
        let logger = {
            let mut state = self.lock_state();
            if state.is_listening() {
                return Err(Error::AlreadyListening);
            }
            state.default_recorder.reset();
            state.handlers.clear();
            state.phase = Phase::Starting;
            state.logger.clone()
        };

        let (listener, local_addr) = match self.setup_listener(port).await {
            Ok(bound) => bound,
            Err(e) => {
                self.lock_state().phase = Phase::Stopped;
                logger.error(format_args!("{e}"));
                return Err(e);
            }
        };

        let logger = logger.for_port(local_addr.port());
        let options = AcceptOptions {
            max_connections: self.config.max_connections,
            limits: ConnectionLimits {
                read_buffer_size: self.config.read_buffer_size,
                max_head_size: self.config.max_head_size,
                max_body_size: self.config.max_body_size,
            },
            shutdown_timeout: self.config.shutdown_timeout,
            logger: logger.clone(),
        };
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (stopped_tx, stopped) = watch::channel(false);

        // Publish the phase before the loop runs so its exit always finds it
        let mut state = self.lock_state();
        state.port = Some(local_addr.port());
        state.logger = logger;
        state.phase = Phase::Listening(Running {
            addr: local_addr,
            shutdown_tx,
            stopped,
        });
        tokio::spawn(Self::accept_loop(listener, self.state.clone(), options, shutdown_rx, stopped_tx));
        state.logger.info(format_args!("Server listening on http://{local_addr}"));

        Ok(local_addr)
    }

    /// Stop listening.
    ///
    /// Waits for in-flight connections (up to the configured shutdown
    /// timeout) and releases the port. Closing a stopped server succeeds
    /// immediately; a close racing another one waits for the same shutdown.
    ///
    /// Dropping the returned future does not cancel the shutdown: the server
    /// still reaches the stopped state once its connections have drained.
    pub async fn close(&self) -> Result<(), Error> {
        let mut stopped = {
            let mut state = self.lock_state();
            match std::mem::replace(&mut state.phase, Phase::Stopped) {
                Phase::Listening(running) => {
                    let _ = running.shutdown_tx.send(());
                    state.phase = Phase::Stopping(running.stopped.clone());
                    running.stopped
                }
                Phase::Stopping(stopped) => {
                    state.phase = Phase::Stopping(stopped.clone());
                    stopped
                }
                other => {
                    state.phase = other;
                    return Ok(());
                }
            }
        };

        let drained = stopped.wait_for(|done| *done).await.is_ok();

        let mut state = self.lock_state();
        if !drained {
            // The accept loop died without settling the phase
            state.mark_stopped();
            return Err(Error::InternalError("accept loop exited before shutting down".to_string()));
        }
        state.logger.info(format_args!("Server closed"));

        Ok(())
    }

    /// Whether the server is listening (or in the middle of starting or stopping).
    pub fn is_listening(&self) -> bool {
        self.lock_state().is_listening()
    }

    /// The port bound by the most recent successful `listen`.
    pub fn port(&self) -> Option<u16> {
        self.lock_state().port
    }

    /// The bound address while listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_state().local_addr()
    }

    /// A URL for `path` on this server, while listening.
    pub fn url(&self, path: &str) -> Option<String> {
        self.local_addr().map(|addr| format!("http://{addr}{path}"))
    }

    /// Queue a handler.
    pub fn add_handler<F>(&self, handler: F)
    where
        F: FnOnce(&HttpRequest, &mut HttpResponse, &str) -> HandlerResult + Send + 'static,
    {
        self.lock_state().handlers.push(Box::new(handler));
    }

    /// Replace every queued handler with `handler`.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: FnOnce(&HttpRequest, &mut HttpResponse, &str) -> HandlerResult + Send + 'static,
    {
        self.lock_state().handlers.replace(Box::new(handler));
    }

    /// Drop every queued handler.
    pub fn clear_handlers(&self) {
        self.lock_state().handlers.clear();
    }

    /// Queue a route.
    ///
    /// `method` and `path` are logged but not matched: the route answers the
    /// next request that finds it at the head of the queue.
    pub fn register(&self, method: Method, path: &str, reply: impl Into<Reply>) {
        let mut state = self.lock_state();
        let handler = reply.into().into_handler(method, path, &state.logger);
        state.handlers.push(handler);
    }

    /// Number of handlers waiting in the queue.
    pub fn pending_handlers(&self) -> usize {
        self.lock_state().handlers.len()
    }

    /// The most recent request seen by this server's own recorder.
    pub fn last_request(&self) -> Option<RequestSnapshot> {
        self.lock_state().default_recorder.last_request()
    }

    /// Every request seen by this server's own recorder since it last started listening.
    pub fn requests(&self) -> Vec<RequestSnapshot> {
        self.lock_state().default_recorder.requests()
    }

    /// A handle onto this server's own recorder.
    pub fn recorder(&self) -> Recorder {
        self.lock_state().default_recorder.clone()
    }

    /// Bind the TCP listener.
    async fn setup_listener(&self, port: u16) -> Result<(TcpListener, SocketAddr), Error> {
        let addr = SocketAddr::new(self.config.host, port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        Ok((listener, local_addr))
    }

    /// Accept connections until shutdown is signalled.
    async fn accept_loop(
        listener: TcpListener,
        state: SharedState,
        options: AcceptOptions,
        mut shutdown_rx: oneshot::Receiver<()>,
        stopped_tx: watch::Sender<bool>,
    ) {
        let semaphore = Arc::new(Semaphore::new(options.max_connections));
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    options.logger.debug(format_args!("Shutting down server..."));
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((socket, addr)) => {
                            Self::handle_new_connection(
                                socket,
                                addr,
                                semaphore.clone(),
                                state.clone(),
                                &options,
                                &mut tasks,
                            ).await;
                        }
                        Err(e) => {
                            if Self::handle_connection_error(e, &options.logger).await {
                                break;
                            }
                        }
                    }
                }

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        options.logger.error(format_args!("Connection task failed: {e}"));
                    }
                }
            }
        }

        // Release the port before draining connections
        drop(listener);
        Self::perform_shutdown(&mut tasks, options.shutdown_timeout, &options.logger).await;

        lock_state(&state).mark_stopped();
        let _ = stopped_tx.send(true);
    }

    /// Handle a new connection.
    async fn handle_new_connection(
        mut socket: TcpStream,
        addr: SocketAddr,
        semaphore: Arc<Semaphore>,
        state: SharedState,
        options: &AcceptOptions,
        tasks: &mut JoinSet<()>,
    ) {
        let permit = match semaphore.try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                options.logger.warn(format_args!("Connection limit reached, rejecting connection from {addr}"));
                let response = HttpResponse::new(StatusCode::SERVICE_UNAVAILABLE)
                    .with_content_type("text/plain")
                    .with_body_string("Server is at capacity, please try again later");
                let _ = socket.write_all(&response.to_bytes()).await;
                return;
            }
        };

        options.logger.debug(format_args!("Connection from: {addr}"));
        let limits = options.limits;
        let logger = options.logger.clone();

        tasks.spawn(async move {
            // The permit is dropped when the task completes, releasing the semaphore slot
            let _permit = permit;

            if let Err(e) = handle_connection(&mut socket, &state, limits).await {
                logger.error(format_args!("Error handling connection from {addr}: {e}"));
            }
        });
    }

    /// Handle accept errors. Returns `true` if the loop should stop.
    async fn handle_connection_error(e: std::io::Error, logger: &ServerLogger) -> bool {
        logger.error(format_args!("Error accepting connection: {e}"));

        if e.kind() == std::io::ErrorKind::BrokenPipe {
            logger.error(format_args!("Critical error accepting connection, shutting down"));
            return true;
        }

        // For other errors, wait a bit before retrying
        tokio::time::sleep(Duration::from_millis(100)).await;
        false
    }

    /// Wait for in-flight connections, aborting whatever outlives the timeout.
    async fn perform_shutdown(tasks: &mut JoinSet<()>, timeout: Duration, logger: &ServerLogger) {
        if !tasks.is_empty() {
            logger.debug(format_args!("Waiting for {len} active connections to complete...", len = tasks.len()));
        }

        let drained = tokio::time::timeout(timeout, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    logger.error(format_args!("Task failed during shutdown: {e}"));
                }
            }
        })
        .await;

        if drained.is_err() {
            logger.warn(format_args!("Aborting {len} connections still open after {timeout:?}", len = tasks.len()));
            tasks.abort_all();
        }
    }
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("MockServer")
            .field("listening", &state.is_listening())
            .field("port", &state.port)
            .field("pending_handlers", &state.handlers.len())
            .finish()
    }
}
