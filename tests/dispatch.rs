mod common;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;

use stubhttp_rs::{HistoryRecorder, Method, MockServer, Recorder, Reply};

use common::{get, quiet_config, quiet_server, request, send_raw};

#[tokio::test]
async fn test_status_only_route() {
    let server = quiet_server().await;
    let addr = server.listen(0).await.unwrap();
    server.register(Method::GET, "/", Reply::status(400));

    let response = get(addr, "/").await;
    assert_eq!(response.status, 400);
    assert_eq!(response.body, "");
    assert!(response.head.contains("Connection: close"));

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_route_with_custom_body() {
    let server = quiet_server().await;
    let addr = server.listen(0).await.unwrap();
    server.register(Method::GET, "/", (200u16, "my custom body"));

    let response = get(addr, "/").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "my custom body");

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_routes_ignore_method_and_path() {
    let server = quiet_server().await;
    let addr = server.listen(0).await.unwrap();
    server.register(Method::DELETE, "/never", Reply::text(202, "first"));
    server.register(Method::GET, "/", Reply::text(200, "second"));

    let first = request(addr, "POST", "/anything", &[], "payload").await;
    let second = get(addr, "/somewhere-else").await;
    assert_eq!((first.status, first.body.as_str()), (202, "first"));
    assert_eq!((second.status, second.body.as_str()), (200, "second"));

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_last_request_reports_query_and_headers() {
    let server = quiet_server().await;
    let addr = server.listen(0).await.unwrap();
    server.register(Method::GET, "/", Reply::default());

    request(
        addr,
        "GET",
        "/path1/path2?name=X&address=Y",
        &[("X-My-Custom-Header", "dummy")],
        "",
    )
    .await;

    let last = server.last_request().unwrap();
    assert_eq!(last.method, "GET");
    assert_eq!(last.path, "/path1/path2?name=X&address=Y");
    assert_eq!(last.pathname, "/path1/path2");
    assert_eq!(last.query.len(), 2);
    assert_eq!(last.query["name"], "X");
    assert_eq!(last.query["address"], "Y");
    assert_eq!(last.headers["x-my-custom-header"], "dummy");

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_handler_failure_is_answered_with_500() {
    let server = quiet_server().await;
    let addr = server.listen(0).await.unwrap();
    server.add_handler(|_, _, _| Err("boom".into()));

    let response = request(addr, "POST", "/orders", &[], "dummy post").await;
    assert_eq!(response.status, 500);

    let (message, snapshot) = response.body.split_once("\n\nRequest: ").unwrap();
    assert_eq!(message, "Error: boom");
    let snapshot: serde_json::Value = serde_json::from_str(snapshot).unwrap();
    assert_eq!(snapshot["method"], "POST");
    assert_eq!(snapshot["body"], "dummy post");

    // The server keeps serving after a failure
    server.register(Method::GET, "/", Reply::default());
    assert_eq!(get(addr, "/").await.status, 200);

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_empty_queue_is_answered_with_500() {
    let server = quiet_server().await;
    let addr = server.listen(0).await.unwrap();

    let response = get(addr, "/nothing-queued").await;
    assert_eq!(response.status, 500);
    assert!(response.body.starts_with("Error: Missing handler.\n\nRequest: "));
    assert_eq!(server.last_request().unwrap().path, "/nothing-queued");

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_malformed_request_gets_400() {
    let server = quiet_server().await;
    let addr = server.listen(0).await.unwrap();
    server.register(Method::GET, "/", Reply::default());

    let response = send_raw(addr, b"NOT-HTTP\r\n\r\n").await;
    assert_eq!(response.status, 400);
    assert!(server.requests().is_empty());
    assert_eq!(server.pending_handlers(), 1);

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_handler_reads_body_and_headers() {
    let server = quiet_server().await;
    let addr = server.listen(0).await.unwrap();
    server.add_handler(|request, response, body| {
        let name = request.get_header("x-name").cloned().unwrap_or_default();
        response.set_status(201);
        response.set_header("Content-Type", "text/plain");
        response.write(format!("{name}:{body}"));
        Ok(())
    });

    let response = request(addr, "PUT", "/items/1", &[("X-Name", "widget")], "blue").await;
    assert_eq!(response.status, 201);
    assert!(response.head.contains("Content-Type: text/plain"));
    assert_eq!(response.body, "widget:blue");

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_requests_each_get_one_handler() {
    let server = quiet_server().await;
    let addr = server.listen(0).await.unwrap();
    for i in 0..8 {
        server.register(Method::GET, "/", Reply::text(200, format!("handler {i}")));
    }

    let mut clients = JoinSet::new();
    for i in 0..8 {
        clients.spawn(async move { get(addr, &format!("/client/{i}")).await });
    }

    let mut bodies = HashSet::new();
    while let Some(response) = clients.join_next().await {
        let response = response.unwrap();
        assert_eq!(response.status, 200);
        bodies.insert(response.body);
    }
    assert_eq!(bodies.len(), 8);
    assert_eq!(server.requests().len(), 8);
    assert_eq!(server.pending_handlers(), 0);

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_handler_can_inspect_server() {
    let server = quiet_server().await;
    let addr = server.listen(0).await.unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let inspector = server.clone();
        let seen = seen.clone();
        server.add_handler(move |_, response, _| {
            let paths: Vec<String> = inspector.requests().into_iter().map(|r| r.path).collect();
            response.write(paths.join(","));
            *seen.lock().unwrap() = paths;
            Ok(())
        });
    }

    let response = get(addr, "/inspect").await;
    assert_eq!(response.body, "/inspect");
    assert_eq!(*seen.lock().unwrap(), vec!["/inspect".to_string()]);

    server.close().await.unwrap();
}

#[tokio::test]
async fn test_shared_recorder_across_servers() {
    let shared = Recorder::new();
    let one = MockServer::with_options(quiet_config().with_port(0).with_history_recorder(shared.clone()))
        .await
        .unwrap();
    let two = MockServer::with_options(quiet_config().with_port(0).with_history_recorder(shared.clone()))
        .await
        .unwrap();
    one.register(Method::GET, "/", Reply::default());
    two.register(Method::GET, "/", Reply::default());

    get(one.local_addr().unwrap(), "/one").await;
    get(two.local_addr().unwrap(), "/two").await;

    let paths: Vec<String> = shared.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(paths, vec!["/one", "/two"]);
    assert_eq!(one.requests().len(), 1);
    assert_eq!(two.last_request().unwrap().path, "/two");

    // Restarting one server leaves the shared history alone
    one.close().await.unwrap();
    one.listen(0).await.unwrap();
    assert!(one.requests().is_empty());
    assert_eq!(shared.len(), 2);

    one.close().await.unwrap();
    two.close().await.unwrap();
}

#[tokio::test]
async fn test_servers_do_not_share_state() {
    let one = quiet_server().await;
    let two = quiet_server().await;
    let addr_one = one.listen(0).await.unwrap();
    let addr_two = two.listen(0).await.unwrap();
    assert_ne!(addr_one.port(), addr_two.port());

    one.register(Method::GET, "/", Reply::text(200, "from one"));
    assert_eq!(two.pending_handlers(), 0);

    let response = get(addr_two, "/").await;
    assert_eq!(response.status, 500);
    assert_eq!(get(addr_one, "/").await.body, "from one");

    assert_eq!(one.last_request().unwrap().path, "/");
    assert_eq!(one.requests().len(), 1);
    assert_eq!(two.requests().len(), 1);
    assert!(!one.recorder().shares_history_with(&two.recorder()));

    one.close().await.unwrap();
    assert!(two.is_listening());
    two.close().await.unwrap();
}
