//! Server configuration.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use log::LevelFilter;

use crate::recorder::HistoryRecorder;
use crate::server::logging::level_from_env;

/// Mock server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// The address to bind to.
    pub host: IpAddr,
    /// Listen on this port as soon as the server is constructed.
    pub port: Option<u16>,
    /// The maximum number of concurrent connections.
    pub max_connections: usize,
    /// The read buffer size.
    pub read_buffer_size: usize,
    /// The largest accepted request head, in bytes.
    pub max_head_size: usize,
    /// The largest accepted request body, in bytes. Chunked bodies count
    /// their framing against this limit.
    pub max_body_size: usize,
    /// How long `close` waits for in-flight connections.
    pub shutdown_timeout: Duration,
    /// Log verbosity for this server.
    pub log_level: LevelFilter,
    /// A recorder attached in addition to the server's own.
    pub history_recorder: Option<Arc<dyn HistoryRecorder>>,
}

impl ServerConfig {
    /// Listen on `port` at construction.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Bind to `host` instead of the loopback address.
    pub fn with_host(mut self, host: impl Into<IpAddr>) -> Self {
        self.host = host.into();
        self
    }

    /// Override the log verbosity.
    pub fn with_log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }

    /// Attach an extra recorder. Pass a clone of a [`Recorder`] to share its
    /// history with the caller or with other servers.
    ///
    /// [`Recorder`]: crate::recorder::Recorder
    pub fn with_history_recorder(mut self, recorder: impl HistoryRecorder + 'static) -> Self {
        self.history_recorder = Some(Arc::new(recorder));
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: None,
            max_connections: 1024,
            read_buffer_size: 8192,
            max_head_size: 64 * 1024,
            max_body_size: 10 * 1024 * 1024,
            shutdown_timeout: Duration::from_secs(5),
            log_level: level_from_env(),
            history_recorder: None,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("max_connections", &self.max_connections)
            .field("read_buffer_size", &self.read_buffer_size)
            .field("max_head_size", &self.max_head_size)
            .field("max_body_size", &self.max_body_size)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("log_level", &self.log_level)
            .field("history_recorder", &self.history_recorder.is_some())
            .finish()
    }
}

/// What a server is constructed from: a bare port or a full configuration.
#[derive(Debug, Clone)]
pub enum ServerOptions {
    /// Listen on this port immediately, with default settings.
    Port(u16),
    /// Use this configuration; listen immediately if it names a port.
    Config(ServerConfig),
}

impl ServerOptions {
    /// Resolve into a configuration.
    pub fn into_config(self) -> ServerConfig {
        match self {
            ServerOptions::Port(port) => ServerConfig::default().with_port(port),
            ServerOptions::Config(config) => config,
        }
    }
}

impl From<u16> for ServerOptions {
    fn from(port: u16) -> Self {
        ServerOptions::Port(port)
    }
}

impl From<ServerConfig> for ServerOptions {
    fn from(config: ServerConfig) -> Self {
        ServerOptions::Config(config)
    }
}
