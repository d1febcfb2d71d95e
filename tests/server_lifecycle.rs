//! End-to-end server lifecycle: a real `listen()` on an ephemeral port, a
//! real TCP client round-trip through `hyper`, `close()` draining an
//! in-flight handler before returning (scenario f), and the event bus
//! surfacing each transition.

use std::sync::Arc;
use std::time::Duration;

use nextrush_core::{Application, Context, Event, Response, Server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn ok(ctx: Context) -> (Context, Response) {
    (ctx, Response::text("ok"))
}

async fn http_get(addr: std::net::SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn live_request_round_trips_over_a_real_socket() {
    let app = Arc::new(Application::new());
    app.get("/ping", ok);

    let server = Server::new(app);
    let addr = server.listen("127.0.0.1:0").await.unwrap();

    let response = http_get(addr, "/ping").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("ok"));

    server.close().await.unwrap();
}

#[tokio::test]
async fn close_waits_for_an_in_flight_handler_to_finish() {
    let app = Arc::new(Application::new());
    app.get("/slow", |ctx: Context| async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        (ctx, Response::text("done"))
    });

    let server = Server::new(app);
    let addr = server.listen("127.0.0.1:0").await.unwrap();

    let client = tokio::spawn(async move { http_get(addr, "/slow").await });

    // give the client time to connect and the handler to start sleeping
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = std::time::Instant::now();
    server.close().await.unwrap();
    let elapsed = started.elapsed();

    let response = client.await.unwrap();
    assert!(response.ends_with("done"));
    assert!(elapsed >= Duration::from_millis(70), "close() returned before the in-flight handler finished");
}

#[tokio::test]
async fn listen_close_cycle_emits_the_documented_events() {
    let app = Arc::new(Application::new());
    let bus = app.events();
    let mut rx = bus.subscribe();

    let server = Server::new(app);
    server.listen("127.0.0.1:0").await.unwrap();
    server.close().await.unwrap();

    let mut saw_listening = false;
    let mut saw_close = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            Event::Listening { .. } => saw_listening = true,
            Event::Close => saw_close = true,
            _ => {}
        }
    }

    assert!(saw_listening, "expected a Listening event");
    assert!(saw_close, "expected a Close event");
}

#[tokio::test]
async fn port_is_released_after_close() {
    let app = Arc::new(Application::new());
    let server = Server::new(app);
    let addr = server.listen("127.0.0.1:0").await.unwrap();
    server.close().await.unwrap();

    // the listener task has been joined by the time close() returns, so the
    // port should be immediately bindable again.
    let second = Server::new(Arc::new(Application::new()));
    second.listen(&addr.to_string()).await.unwrap();
    second.close().await.unwrap();
}
