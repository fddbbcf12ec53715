//! Per-connection request handling.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::parser::{BodyFraming, Error as ParserError, HttpRequest, decode_chunked, find_head_end, parse_request};
use crate::recorder::RequestSnapshot;
use crate::server::error::Error;
use crate::server::handler::Handler;
use crate::server::response::{HttpResponse, StatusCode};
use crate::server::state::{SharedState, lock_state};

/// Buffer sizes applied while reading a request.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnectionLimits {
    pub(crate) read_buffer_size: usize,
    pub(crate) max_head_size: usize,
    pub(crate) max_body_size: usize,
}

/// Serve one request on `socket`, then close it.
///
/// A malformed request is answered with `400 Bad Request` and never reaches
/// the recorders or the handler queue.
pub(crate) async fn handle_connection(
    socket: &mut (impl AsyncRead + AsyncWrite + Unpin),
    state: &SharedState,
    limits: ConnectionLimits,
) -> Result<(), Error> {
    let request = match read_request(socket, limits).await {
        Ok(Some(request)) => request,
        Ok(None) => return Ok(()), // Connection closed
        Err(Error::ParseError(e)) => {
            let response = HttpResponse::new(StatusCode::BAD_REQUEST)
                .with_content_type("text/plain")
                .with_body_string(format!("Error parsing request: {e}"));
            socket.write_all(&response.to_bytes()).await?;
            let _ = socket.shutdown().await;
            return Err(Error::ParseError(e));
        }
        Err(e) => return Err(e),
    };

    let response = dispatch(state, &request);

    socket.write_all(&response.to_bytes()).await?;
    socket.flush().await?;
    let _ = socket.shutdown().await;

    Ok(())
}

/// Read one request, buffering its whole body.
///
/// Returns `Ok(None)` if the peer closed the connection without sending anything.
pub(crate) async fn read_request(
    socket: &mut (impl AsyncRead + AsyncWrite + Unpin),
    limits: ConnectionLimits,
) -> Result<Option<HttpRequest>, Error> {
    let mut chunk = vec![0; limits.read_buffer_size.max(1)];
    let mut buf = Vec::new();

    let head_end = loop {
        if let Some(end) = find_head_end(&buf) {
            break end;
        }
        if buf.len() > limits.max_head_size {
            return Err(ParserError::HeadTooLarge(limits.max_head_size).into());
        }

        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(ParserError::IncompleteRequest.into());
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let mut request = parse_request(&buf[..head_end])?;
    let mut rest = buf.split_off(head_end);
    let framing = request.body_framing()?;

    // Refuse an oversized body before inviting the client to send it
    if matches!(framing, BodyFraming::Length(length) if length > limits.max_body_size) {
        return Err(ParserError::BodyTooLarge(limits.max_body_size).into());
    }

    if framing != BodyFraming::Empty && request.expects_continue() {
        socket.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
    }

    request.body = match framing {
        BodyFraming::Empty => Vec::new(),
        BodyFraming::Length(length) => {
            while rest.len() < length {
                read_more(socket, &mut chunk, &mut rest).await?;
            }
            rest.truncate(length);
            rest
        }
        BodyFraming::Chunked => loop {
            if let Some((body, _)) = decode_chunked(&rest)? {
                break body;
            }
            if rest.len() > limits.max_body_size {
                return Err(ParserError::BodyTooLarge(limits.max_body_size).into());
            }
            read_more(socket, &mut chunk, &mut rest).await?;
        },
    };

    Ok(Some(request))
}

async fn read_more(
    socket: &mut (impl AsyncRead + Unpin),
    chunk: &mut [u8],
    buf: &mut Vec<u8>,
) -> Result<(), Error> {
    let n = socket.read(chunk).await?;
    if n == 0 {
        return Err(ParserError::IncompleteRequest.into());
    }
    buf.extend_from_slice(&chunk[..n]);
    Ok(())
}

/// Record `request` and answer it with the next queued handler.
///
/// Recording and dequeuing happen under one lock, so both follow the order in
/// which requests finished arriving. The handler runs with the lock released.
pub(crate) fn dispatch(state: &SharedState, request: &HttpRequest) -> HttpResponse {
    let (handler, logger) = {
        let mut state = lock_state(state);
        state.record(request);
        (state.handlers.pop(), state.logger.clone())
    };
    logger.debug(format_args!("request {} {}", request.method, request.path));

    let outcome = match handler {
        Some(handler) => {
            logger.debug(format_args!("Calling handler"));
            invoke(handler, request)
        }
        None => Err(Error::MissingHandler),
    };

    match outcome {
        Ok(response) => response,
        Err(e) => {
            logger.error(format_args!("{e}"));
            failure_response(&e, request)
        }
    }
}

fn invoke(handler: Handler, request: &HttpRequest) -> Result<HttpResponse, Error> {
    let body = request.body_text();
    let mut response = HttpResponse::default();

    let result = panic::catch_unwind(AssertUnwindSafe(|| handler(request, &mut response, &body)));
    match result {
        Ok(Ok(())) => Ok(response),
        Ok(Err(e)) => Err(Error::HandlerFault(e.to_string())),
        Err(payload) => Err(Error::HandlerFault(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// The `500` answer for a failed dispatch, carrying the request as JSON.
pub(crate) fn failure_response(error: &Error, request: &HttpRequest) -> HttpResponse {
    let snapshot = RequestSnapshot::capture(request);
    HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR)
        .with_content_type("text/plain")
        .with_body_string(format!("Error: {error}\n\nRequest: {}", snapshot.to_json()))
}
