//! Helpers shared by the end-to-end tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use log::LevelFilter;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use stubhttp_rs::{MockServer, ServerConfig};

/// A parsed response as seen by a client.
#[derive(Debug)]
pub struct ClientResponse {
    pub status: u16,
    pub head: String,
    pub body: String,
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn quiet_config() -> ServerConfig {
    init_logging();
    ServerConfig::default().with_log_level(LevelFilter::Off)
}

/// A stopped server that logs nothing.
pub async fn quiet_server() -> MockServer {
    MockServer::with_options(quiet_config()).await.unwrap()
}

/// Send `raw` as-is and read until the server closes the connection.
pub async fn send_raw(addr: SocketAddr, raw: &[u8]) -> ClientResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();

    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).await.unwrap();

    let text = String::from_utf8_lossy(&bytes).into_owned();
    let (head, body) = text.split_once("\r\n\r\n").unwrap_or((text.as_str(), ""));
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or(0);

    ClientResponse {
        status,
        head: head.to_string(),
        body: body.to_string(),
    }
}

/// Issue a request with the given extra headers and body.
pub async fn request(
    addr: SocketAddr,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> ClientResponse {
    let mut raw = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\n");
    for (name, value) in headers {
        raw.push_str(&format!("{name}: {value}\r\n"));
    }
    if !body.is_empty() {
        raw.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    raw.push_str("\r\n");
    raw.push_str(body);

    send_raw(addr, raw.as_bytes()).await
}

pub async fn get(addr: SocketAddr, path: &str) -> ClientResponse {
    request(addr, "GET", path, &[], "").await
}
