mod common;

use std::net::TcpListener as StdTcpListener;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use stubhttp_rs::{Method, MockServer, Reply, ServerError, ServerOptions};

use common::{get, quiet_config, quiet_server};

#[tokio::test]
async fn test_new_server_is_stopped() {
    let server = quiet_server().await;
    assert!(!server.is_listening());
    assert_eq!(server.port(), None);
    assert_eq!(server.local_addr(), None);
    assert_eq!(server.url("/"), None);
}

#[tokio::test]
async fn test_listen_and_close() {
    let server = quiet_server().await;
    let addr = server.listen(0).await.unwrap();

    assert!(server.is_listening());
    assert_eq!(server.port(), Some(addr.port()));
    assert_eq!(server.local_addr(), Some(addr));
    assert_eq!(server.url("/a?b=c").unwrap(), format!("http://{addr}/a?b=c"));

    server.close().await.unwrap();
    assert!(!server.is_listening());
    assert_eq!(server.local_addr(), None);
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_listen_twice_fails_without_side_effects() {
    let server = quiet_server().await;
    let addr = server.listen(0).await.unwrap();
    server.register(Method::GET, "/", Reply::text(200, "still here"));

    let second = server.listen(0).await;
    assert!(matches!(second, Err(ServerError::AlreadyListening)));
    assert_eq!(second.unwrap_err().to_string(), "Already listening");

    assert!(server.is_listening());
    assert_eq!(server.port(), Some(addr.port()));
    assert_eq!(server.pending_handlers(), 1);

    let response = get(addr, "/").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "still here");

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let server = quiet_server().await;
    server.close().await.unwrap();

    server.listen(0).await.unwrap();
    server.close().await.unwrap();
    server.close().await.unwrap();
    assert!(!server.is_listening());
}

#[tokio::test]
async fn test_restart_clears_history_and_handlers() {
    let server = quiet_server().await;
    let addr = server.listen(0).await.unwrap();
    server.register(Method::GET, "/", Reply::default());
    get(addr, "/first").await;
    server.register(Method::GET, "/", Reply::default());

    assert_eq!(server.requests().len(), 1);
    assert_eq!(server.pending_handlers(), 1);
    server.close().await.unwrap();

    // History survives close until the next listen
    assert_eq!(server.last_request().unwrap().path, "/first");

    let addr = server.listen(addr.port()).await.unwrap();
    assert!(server.last_request().is_none());
    assert!(server.requests().is_empty());
    assert_eq!(server.pending_handlers(), 0);

    let response = get(addr, "/").await;
    assert_eq!(response.status, 500);
    assert!(response.body.starts_with("Error: Missing handler."));

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_bind_failure_leaves_server_stopped() {
    let occupied = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let server = quiet_server().await;
    let result = server.listen(port).await;
    assert!(matches!(result, Err(ServerError::Bind { .. })));
    assert!(!server.is_listening());
    assert_eq!(server.port(), None);

    // A failed bind does not block a later listen
    drop(occupied);
    server.listen(0).await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
async fn test_construct_with_port_listens_immediately() {
    common::init_logging();
    let server = MockServer::with_options(ServerOptions::Port(0)).await.unwrap();
    assert!(server.is_listening());
    server.close().await.unwrap();

    let server = MockServer::with_options(quiet_config().with_port(0)).await.unwrap();
    let addr = server.local_addr().unwrap();
    server.register(Method::GET, "/", Reply::status(204));
    assert_eq!(get(addr, "/").await.status, 204);
    server.close().await.unwrap();
}

#[tokio::test]
async fn test_construct_with_occupied_port_fails() {
    let occupied = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let result = MockServer::with_options(quiet_config().with_port(port)).await;
    assert!(matches!(result, Err(ServerError::Bind { .. })));
}

#[tokio::test]
async fn test_clones_control_the_same_server() {
    let server = quiet_server().await;
    let handle = server.clone();
    let addr = handle.listen(0).await.unwrap();

    assert!(server.is_listening());
    server.register(Method::GET, "/", Reply::default());
    assert_eq!(handle.pending_handlers(), 1);

    get(addr, "/cloned").await;
    assert_eq!(handle.last_request().unwrap().path, "/cloned");

    handle.close().await.unwrap();
    assert!(!server.is_listening());
}

#[tokio::test]
async fn test_cancelled_close_still_stops_the_server() {
    let server = quiet_server().await;
    let addr = server.listen(0).await.unwrap();

    // A request whose head never completes keeps the connection in flight
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"GET / HTTP/1.1\r\nHost: loc").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let timed_out = tokio::time::timeout(Duration::from_millis(50), server.close()).await;
    assert!(timed_out.is_err());

    // Releasing the connection lets the abandoned shutdown finish on its own
    drop(client);
    tokio::time::timeout(Duration::from_secs(2), async {
        while server.is_listening() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    server.close().await.unwrap();
    let addr = server.listen(0).await.unwrap();
    server.register(Method::GET, "/", Reply::status(204));
    assert_eq!(get(addr, "/").await.status, 204);
    server.close().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_close_waits_for_shutdown() {
    let server = quiet_server().await;
    let addr = server.listen(0).await.unwrap();

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"GET / HTTP/1.1\r\nHost: loc").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let first = server.clone();
    let first = tokio::spawn(async move { first.close().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The second close must not return while the first is still draining
    let second = server.clone();
    let mut second = tokio::spawn(async move { second.close().await });
    assert!(tokio::time::timeout(Duration::from_millis(50), &mut second).await.is_err());
    assert!(server.is_listening());

    drop(client);
    second.await.unwrap().unwrap();
    first.await.unwrap().unwrap();
    assert!(!server.is_listening());
    assert!(TcpStream::connect(addr).await.is_err());
}
