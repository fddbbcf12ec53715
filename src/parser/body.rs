//! Request body framing.

use crate::parser::error::Error;
use crate::parser::request::HttpRequest;

/// How the body of a request is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// No body follows the head.
    Empty,
    /// Exactly this many bytes follow the head.
    Length(usize),
    /// The body uses chunked transfer coding.
    Chunked,
}

impl HttpRequest {
    /// Determine the body framing from the request headers.
    ///
    /// `Transfer-Encoding: chunked` takes precedence over `Content-Length`.
    pub fn body_framing(&self) -> Result<BodyFraming, Error> {
        if let Some(encoding) = self.get_header("Transfer-Encoding") {
            let chunked = encoding
                .rsplit(',')
                .next()
                .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"));
            if chunked {
                return Ok(BodyFraming::Chunked);
            }
        }

        match self.get_header("Content-Length") {
            Some(value) => {
                let length = value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| Error::InvalidContentLength(value.clone()))?;
                if length == 0 {
                    Ok(BodyFraming::Empty)
                } else {
                    Ok(BodyFraming::Length(length))
                }
            }
            None => Ok(BodyFraming::Empty),
        }
    }
}

fn find_crlf(input: &[u8], from: usize) -> Option<usize> {
    input
        .get(from..)?
        .windows(2)
        .position(|window| window == b"\r\n")
        .map(|pos| from + pos)
}

/// Decode a chunked body from the start of `input`.
///
/// Returns `Ok(None)` while more bytes are needed, and otherwise the decoded
/// body together with the number of input bytes consumed (trailers included).
/// Chunk extensions and trailer fields are skipped.
pub fn decode_chunked(input: &[u8]) -> Result<Option<(Vec<u8>, usize)>, Error> {
    let mut body = Vec::new();
    let mut pos = 0;

    loop {
        let Some(line_end) = find_crlf(input, pos) else {
            return Ok(None);
        };

        let size_line = String::from_utf8_lossy(&input[pos..line_end]);
        let size_text = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_text, 16)
            .map_err(|_| Error::InvalidChunk(size_text.to_string()))?;
        pos = line_end + 2;

        if size == 0 {
            // Skip trailer fields up to the terminating blank line
            loop {
                let Some(trailer_end) = find_crlf(input, pos) else {
                    return Ok(None);
                };
                let blank = trailer_end == pos;
                pos = trailer_end + 2;
                if blank {
                    return Ok(Some((body, pos)));
                }
            }
        }

        let (data_end, chunk_end) = pos
            .checked_add(size)
            .and_then(|data_end| Some((data_end, data_end.checked_add(2)?)))
            .ok_or_else(|| Error::InvalidChunk(size_text.to_string()))?;
        if input.len() < chunk_end {
            return Ok(None);
        }
        if &input[data_end..chunk_end] != b"\r\n" {
            return Err(Error::InvalidChunk("missing CRLF after chunk data".to_string()));
        }

        body.extend_from_slice(&input[pos..data_end]);
        pos = chunk_end;
    }
}
