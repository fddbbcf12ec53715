//! Response handlers and the handler queue.
//!
//! Requests are not routed: each request consumes the oldest queued handler,
//! whatever its method or path.

use std::collections::VecDeque;
use std::fmt;

use crate::parser::{HttpRequest, Method};
use crate::server::logging::ServerLogger;
use crate::server::response::{HttpResponse, StatusCode};

/// Error type handlers may fail with.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by a handler.
pub type HandlerResult = Result<(), HandlerError>;

/// A one-shot handler: receives the request, the response to fill in, and the
/// buffered request body.
pub type Handler = Box<dyn FnOnce(&HttpRequest, &mut HttpResponse, &str) -> HandlerResult + Send>;

/// What a registered route replies with.
pub enum Reply {
    /// Answer with `status`, writing `body` when present.
    Status {
        status: StatusCode,
        body: Option<String>,
    },
    /// Run a custom handler.
    Handler(Handler),
}

impl Reply {
    /// Reply with `status` and no body.
    pub fn status(status: u16) -> Self {
        Reply::Status {
            status: StatusCode::new(status),
            body: None,
        }
    }

    /// Reply with `status` and a text body.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Reply::Status {
            status: StatusCode::new(status),
            body: Some(body.into()),
        }
    }

    /// Reply by running `handler`.
    pub fn handler<F>(handler: F) -> Self
    where
        F: FnOnce(&HttpRequest, &mut HttpResponse, &str) -> HandlerResult + Send + 'static,
    {
        Reply::Handler(Box::new(handler))
    }

    pub(crate) fn into_handler(self, method: Method, path: &str, logger: &ServerLogger) -> Handler {
        match self {
            Reply::Handler(handler) => {
                logger.debug(format_args!("register route {method} {path} -> custom handler"));
                handler
            }
            Reply::Status { status, body } => {
                logger.debug(format_args!("register route: {method} {path} -> {status}, {body:?}"));
                let logger = logger.clone();
                Box::new(move |_request: &HttpRequest, response: &mut HttpResponse, _body: &str| -> HandlerResult {
                    logger.debug(format_args!("<- {status}, {body:?}"));
                    response.status = status;
                    if let Some(body) = body.filter(|body| !body.is_empty()) {
                        response.write(body);
                    }
                    Ok(())
                })
            }
        }
    }
}

impl Default for Reply {
    fn default() -> Self {
        Reply::status(200)
    }
}

impl From<u16> for Reply {
    fn from(status: u16) -> Self {
        Reply::status(status)
    }
}

impl From<StatusCode> for Reply {
    fn from(status: StatusCode) -> Self {
        Reply::Status { status, body: None }
    }
}

impl From<(u16, &str)> for Reply {
    fn from((status, body): (u16, &str)) -> Self {
        Reply::text(status, body)
    }
}

impl From<(u16, String)> for Reply {
    fn from((status, body): (u16, String)) -> Self {
        Reply::text(status, body)
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status { status, body } => f
                .debug_struct("Status")
                .field("status", status)
                .field("body", body)
                .finish(),
            Reply::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// FIFO queue of pending handlers.
#[derive(Default)]
pub(crate) struct HandlerQueue {
    handlers: VecDeque<Handler>,
}

impl HandlerQueue {
    pub(crate) fn push(&mut self, handler: Handler) {
        self.handlers.push_back(handler);
    }

    /// Replace every pending handler with `handler`.
    pub(crate) fn replace(&mut self, handler: Handler) {
        self.handlers.clear();
        self.handlers.push_back(handler);
    }

    pub(crate) fn clear(&mut self) {
        self.handlers.clear();
    }

    pub(crate) fn pop(&mut self) -> Option<Handler> {
        self.handlers.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.len()
    }
}

impl fmt::Debug for HandlerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerQueue")
            .field("pending", &self.handlers.len())
            .finish()
    }
}
