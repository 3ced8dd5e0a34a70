//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use prefix_proxy::config::{ProxyConfig, RouteConfig};
use prefix_proxy::{HttpServer, Shutdown};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

/// Start an upstream that answers `<name> host=<Host> path=<path?query>`.
pub async fn start_echo_upstream(name: &'static str) -> SocketAddr {
    start_echo_upstream_with_delay(name, Duration::ZERO).await
}

/// Same as [`start_echo_upstream`], sleeping before every answer.
pub async fn start_echo_upstream_with_delay(name: &'static str, delay: Duration) -> SocketAddr {
    let app = Router::new().fallback(move |req: Request<Body>| async move {
        tokio::time::sleep(delay).await;
        let host = req
            .headers()
            .get("host")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("-")
            .to_string();
        format!("{name} host={host} path={}", req.uri())
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a WebSocket upstream that echoes every text or binary message.
pub async fn start_ws_echo_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    if msg.is_text() || msg.is_binary() {
                        if ws.send(msg).await.is_err() {
                            break;
                        }
                    } else if msg.is_close() {
                        break;
                    }
                }
            });
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A listener whose accept queue is full and never drained.
///
/// New connections to `addr` get no SYN-ACK, so connecting hangs until the
/// caller's connect timeout fires.
pub struct SaturatedListener {
    pub addr: SocketAddr,
    _listener: TcpListener,
    _queued: Vec<TcpStream>,
}

pub async fn saturated_listener() -> SaturatedListener {
    let socket = TcpSocket::new_v4().unwrap();
    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let listener = socket.listen(1).unwrap();
    let addr = listener.local_addr().unwrap();

    let mut queued = Vec::new();
    for _ in 0..16 {
        match tokio::time::timeout(Duration::from_millis(200), TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => queued.push(stream),
            _ => break,
        }
    }

    SaturatedListener {
        addr,
        _listener: listener,
        _queued: queued,
    }
}

/// A rule with origin change and WebSocket passthrough, as the dev server uses.
pub fn dev_rule(pattern: &str, upstream: SocketAddr) -> RouteConfig {
    let mut route = RouteConfig::new(pattern, format!("http://{upstream}"));
    route.change_origin = true;
    route.ws = true;
    route
}

/// Run a proxy on an ephemeral port.
pub async fn start_proxy(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
