//! An in-process mock HTTP server for test suites.
//!
//! The server listens on a real TCP port and answers each request with the
//! next handler from a FIFO queue. Requests are matched by arrival order
//! only: the first request is served by the first registered route, the
//! second by the second, and so on. Every request is recorded so tests can
//! assert on what the code under test actually sent.
//!
//! # Features
//!
//! - One-shot response rules (`register`) and raw handlers (`add_handler`,
//!   `set_handler`, `clear_handlers`)
//! - Request history with `last_request` and `requests`
//! - Extra recorders that can be shared between several servers
//! - Idempotent `close`, and state reset on every `listen`
//! - Handler failures and an empty queue answered with `500` and a diagnostic body
//!
//! # Examples
//!
//! ```no_run
//! use stubhttp_rs::{Method, MockServer, Reply};
//!
//! # async fn run() -> Result<(), stubhttp_rs::ServerError> {
//! let server = MockServer::new();
//! let addr = server.listen(0).await?;
//!
//! server.register(Method::GET, "/", Reply::text(200, "my custom body"));
//! server.register(Method::POST, "/orders", Reply::status(400));
//!
//! // ... point the code under test at `addr` ...
//! # let _ = addr;
//!
//! if let Some(request) = server.last_request() {
//!     println!("{} {}", request.method, request.path);
//! }
//!
//! server.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom handlers
//!
//! ```no_run
//! use stubhttp_rs::MockServer;
//!
//! # async fn run() -> Result<(), stubhttp_rs::ServerError> {
//! let server = MockServer::with_options(0u16).await?;
//!
//! server.add_handler(|request, response, body| {
//!     if body.is_empty() {
//!         return Err(format!("empty body for {}", request.path).into());
//!     }
//!     response.set_status(201);
//!     response.write(body);
//!     Ok(())
//! });
//! # Ok(())
//! # }
//! ```
//!
//! ## Sharing a recorder
//!
//! ```no_run
//! use stubhttp_rs::{HistoryRecorder, MockServer, Recorder, ServerConfig};
//!
//! # async fn run() -> Result<(), stubhttp_rs::ServerError> {
//! let shared = Recorder::new();
//! let one = MockServer::with_options(ServerConfig::default().with_port(0).with_history_recorder(shared.clone())).await?;
//! let two = MockServer::with_options(ServerConfig::default().with_port(0).with_history_recorder(shared.clone())).await?;
//!
//! // ... requests to either server show up in `shared.requests()` ...
//! # let _ = (one, two);
//! # Ok(())
//! # }
//! ```

pub mod parser;

pub mod recorder;

pub mod server;

// Re-export commonly used items for convenience
pub use parser::{Error as ParserError, HttpRequest, HttpVersion, Method, parse_request};
pub use recorder::{HistoryRecorder, Recorder, RequestSnapshot};
pub use server::{
    Error as ServerError, HandlerError, HandlerResult, HttpResponse, MockServer, Reply, ServerConfig,
    ServerOptions, StatusCode,
};
