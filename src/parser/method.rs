//! Request methods.

use std::fmt;
use std::str::FromStr;

use crate::parser::error::Error;

/// Request methods the parser accepts.
///
/// The mock server never routes on the method; it is recorded and logged.
/// Any well-formed method token outside the common set (`PURGE`, `PROPFIND`,
/// `REPORT`, ...) is kept as [`Method::Extension`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    HEAD,
    OPTIONS,
    PATCH,
    TRACE,
    CONNECT,
    Extension(String),
}

impl Method {
    const KNOWN: [Method; 9] = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::HEAD,
        Method::OPTIONS,
        Method::PATCH,
        Method::TRACE,
        Method::CONNECT,
    ];

    /// The method token as it appears on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::TRACE => "TRACE",
            Method::CONNECT => "CONNECT",
            Method::Extension(token) => token,
        }
    }
}

/// RFC 9110 `tchar`.
fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Method tokens are case-sensitive
        if let Some(known) = Method::KNOWN.into_iter().find(|method| method.as_str() == s) {
            return Ok(known);
        }
        if s.is_empty() || !s.chars().all(is_token_char) {
            return Err(Error::InvalidMethod(s.to_string()));
        }
        Ok(Method::Extension(s.to_string()))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
