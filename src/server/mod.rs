//! Mock HTTP server.
//!
//! A [`MockServer`] accepts real TCP connections, records every request and
//! answers it with the next handler from its queue.

mod response;
mod config;
mod error;
mod handler;
mod logging;
mod state;
mod dispatch;
mod http_server;

// Re-export public items
pub use response::{HttpResponse, StatusCode};
pub use config::{ServerConfig, ServerOptions};
pub use error::Error;
pub use handler::{Handler, HandlerError, HandlerResult, Reply};
pub use logging::{LOG_LEVEL_ENV, level_from_env, parse_level};
pub use http_server::MockServer;
