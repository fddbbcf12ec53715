//! Captured request snapshots.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

use crate::parser::HttpRequest;

/// An immutable copy of an inbound request, taken when it was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    /// The request method, e.g. `GET`
    pub method: String,
    /// The raw request target, including the query string
    pub path: String,
    /// The request target without the query string
    pub pathname: String,
    /// Decoded query parameters
    pub query: BTreeMap<String, String>,
    /// Request headers, keyed by lowercase name
    pub headers: BTreeMap<String, String>,
    /// The fully buffered request body
    pub body: String,
}

impl RequestSnapshot {
    /// Capture a snapshot of a parsed request.
    pub fn capture(request: &HttpRequest) -> Self {
        Self {
            method: request.method.to_string(),
            path: request.path.clone(),
            pathname: request.pathname().to_string(),
            query: request
                .query_params
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            headers: request
                .headers
                .iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
                .collect(),
            body: request.body_text(),
        }
    }

    /// Look up a header by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Serialize the snapshot as compact JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "null".to_string())
    }
}
