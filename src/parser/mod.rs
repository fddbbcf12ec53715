//! HTTP/1.x request parser.
//!
//! Parses the request line and header block of an inbound request and frames
//! its body, either by `Content-Length` or by chunked transfer coding.

mod body;
mod request;
mod method;
mod version;
mod error;

// Re-export public items
pub use request::HttpRequest;
pub use method::Method;
pub use version::HttpVersion;
pub use error::Error;

pub use request::{find_head_end, parse_request};
pub use body::{BodyFraming, decode_chunked};
