//! Protocol upgrade (WebSocket) passthrough.
//!
//! # Responsibilities
//! - Check upgrade handshakes are well formed
//! - Replay the handshake on a dedicated upstream connection
//! - Answer the client with the upstream's `101 Switching Protocols`
//! - Relay bytes in both directions once both sides have switched
//!
//! # Data Flow
//! ```text
//! Client ←──── raw bytes ────→ Proxy ←──── raw bytes ────→ Upstream
//! ```
//!
//! # Design Decisions
//! - Byte-level relay; frames are never parsed or buffered
//! - Closing either side ends the relay and closes the other
//! - A malformed handshake is rejected, never downgraded to plain HTTP
//! - A non-101 upstream answer is passed back to the client unchanged

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, Response, Version};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;

use crate::http::response::{self, ProxyError};
use crate::lifecycle::shutdown;
use crate::net::connection::RelayTracker;
use crate::resilience::timeouts;
use crate::routing::Forward;
use crate::security::headers;

const RELAY_BUFFER_SIZE: usize = 8 * 1024;

/// Check that an upgrade request is a well-formed HTTP/1.1 handshake.
pub fn validate_upgrade<B>(req: &Request<B>) -> Result<(), ProxyError> {
    if req.method() != Method::GET {
        return Err(ProxyError::MalformedUpgrade("upgrade requires GET"));
    }
    if req.version() != Version::HTTP_11 {
        return Err(ProxyError::MalformedUpgrade("upgrade requires HTTP/1.1"));
    }
    if !headers::connection_has_token(req.headers(), "upgrade") {
        return Err(ProxyError::MalformedUpgrade("missing Connection: upgrade"));
    }
    let protocol = req
        .headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();
    if protocol.is_empty() {
        return Err(ProxyError::MalformedUpgrade("empty Upgrade header"));
    }
    Ok(())
}

/// Everything a relay needs besides the two connections.
#[derive(Clone)]
pub struct UpgradeContext {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub tracker: RelayTracker,
    pub shutdown: broadcast::Sender<()>,
}

/// Forward an upgrade handshake and, on success, spawn the relay.
pub async fn proxy_upgrade(
    ctx: &UpgradeContext,
    request_id: &str,
    forward: Forward<'_>,
    mut req: Request<Body>,
) -> Result<axum::response::Response, ProxyError> {
    validate_upgrade(&req)?;

    let client_upgrade = hyper::upgrade::on(&mut req);
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let uri = forward.rule.upstream.origin_form_for(path_and_query)?;

    let mut outbound = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .version(Version::HTTP_11)
        .body(Body::empty())
        .map_err(|_| ProxyError::MalformedUpgrade("invalid handshake"))?;
    *outbound.headers_mut() = forward.headers;
    if !outbound.headers().contains_key(header::HOST) {
        headers::set_host(outbound.headers_mut(), forward.rule.upstream.authority());
    }

    let stream = timeouts::connect(
        &forward.rule.upstream.connect_address(),
        ctx.connect_timeout,
    )
    .await?;
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
    let route = forward.rule.name.clone();
    tokio::spawn(async move {
        if let Err(e) = conn.with_upgrades().await {
            tracing::debug!(route = %route, error = %e, "Upstream connection closed with error");
        }
    });

    let mut upstream_response = tokio::time::timeout(ctx.request_timeout, sender.send_request(outbound))
        .await
        .map_err(|_| ProxyError::Timeout(ctx.request_timeout))??;
    if upstream_response.status() != axum::http::StatusCode::SWITCHING_PROTOCOLS {
        tracing::debug!(
            request_id = %request_id,
            status = %upstream_response.status(),
            "Upstream declined upgrade"
        );
        return Ok(response::from_upstream(upstream_response));
    }

    let upstream_upgrade = hyper::upgrade::on(&mut upstream_response);
    let guard = ctx.tracker.track();
    let shutdown_rx = ctx.shutdown.subscribe();
    let request_id = request_id.to_string();
    let target = forward.rule.upstream.to_string();

    tokio::spawn(async move {
        let (client_io, upstream_io) = match tokio::try_join!(client_upgrade, upstream_upgrade) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Upgrade failed, closing both sides");
                return;
            }
        };

        tracing::debug!(request_id = %request_id, connection_id = %guard.id(), target = %target, "Relay started");
        match relay(TokioIo::new(client_io), TokioIo::new(upstream_io), shutdown_rx).await {
            Ok((up, down)) => tracing::debug!(
                request_id = %request_id,
                connection_id = %guard.id(),
                bytes_to_upstream = up,
                bytes_to_client = down,
                "Relay finished"
            ),
            Err(e) => tracing::debug!(
                request_id = %request_id,
                connection_id = %guard.id(),
                error = %e,
                "Relay ended with error"
            ),
        }
        drop(guard);
    });

    // The client gets the upstream's 101 verbatim, including
    // Connection/Upgrade and any negotiated extensions.
    let (parts, _) = upstream_response.into_parts();
    Ok(Response::from_parts(parts, Body::empty()))
}

/// Copy bytes both ways until either side closes or shutdown fires.
///
/// Returns bytes sent (client → upstream, upstream → client). The relay
/// ends as soon as one direction reaches EOF or fails; both streams are
/// dropped on return, so the other side is closed too.
pub async fn relay<C, U>(
    client: C,
    upstream: U,
    shutdown_rx: broadcast::Receiver<()>,
) -> std::io::Result<(u64, u64)>
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    let (client_read, client_write) = tokio::io::split(client);
    let (upstream_read, upstream_write) = tokio::io::split(upstream);
    let mut to_upstream = 0u64;
    let mut to_client = 0u64;

    let outcome = tokio::select! {
        res = pipe(client_read, upstream_write, &mut to_upstream) => {
            tracing::trace!("Client side closed");
            res
        }
        res = pipe(upstream_read, client_write, &mut to_client) => {
            tracing::trace!("Upstream side closed");
            res
        }
        _ = shutdown::wait(shutdown_rx) => {
            tracing::debug!("Relay cancelled by shutdown");
            Ok(())
        }
    };

    outcome.map(|()| (to_upstream, to_client))
}

/// One relay direction: copy until EOF, then shut down the writer.
async fn pipe<R, W>(mut reader: R, mut writer: W, copied: &mut u64) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return writer.shutdown().await;
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        *copied += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake() -> axum::http::request::Builder {
        Request::builder()
            .uri("/api/socket")
            .header("connection", "Upgrade")
            .header("upgrade", "websocket")
    }

    #[test]
    fn accepts_well_formed_handshake() {
        let req = handshake().body(()).unwrap();
        assert!(validate_upgrade(&req).is_ok());
    }

    #[test]
    fn rejects_malformed_handshakes() {
        let post = handshake().method(Method::POST).body(()).unwrap();
        assert!(matches!(validate_upgrade(&post), Err(ProxyError::MalformedUpgrade(_))));

        let no_token = Request::builder()
            .uri("/api/socket")
            .header("connection", "keep-alive")
            .header("upgrade", "websocket")
            .body(())
            .unwrap();
        assert!(matches!(validate_upgrade(&no_token), Err(ProxyError::MalformedUpgrade(_))));

        let empty = Request::builder()
            .uri("/api/socket")
            .header("connection", "upgrade")
            .header("upgrade", " ")
            .body(())
            .unwrap();
        assert!(matches!(validate_upgrade(&empty), Err(ProxyError::MalformedUpgrade(_))));

        let http10 = handshake().version(Version::HTTP_10).body(()).unwrap();
        assert!(matches!(validate_upgrade(&http10), Err(ProxyError::MalformedUpgrade(_))));
    }

    #[tokio::test]
    async fn relay_copies_both_ways_and_propagates_close() {
        let (client_side, mut client) = tokio::io::duplex(1024);
        let (upstream_side, mut upstream) = tokio::io::duplex(1024);
        let (tx, _) = broadcast::channel(1);

        let relay = tokio::spawn(relay(client_side, upstream_side, tx.subscribe()));

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        upstream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        upstream.write_all(b"pong").await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        // Client goes away: the upstream must see EOF.
        drop(client);
        let mut rest = Vec::new();
        upstream.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        let (up, down) = relay.await.unwrap().unwrap();
        assert_eq!((up, down), (4, 4));
    }

    #[tokio::test]
    async fn relay_ends_when_client_closes_and_upstream_stays_silent() {
        let (client_side, client) = tokio::io::duplex(64);
        let (upstream_side, mut upstream) = tokio::io::duplex(64);
        let (tx, _) = broadcast::channel(1);

        let relay = tokio::spawn(relay(client_side, upstream_side, tx.subscribe()));

        // The upstream end is kept open and never writes.
        drop(client);
        let finished = tokio::time::timeout(Duration::from_secs(2), relay).await;
        assert!(finished.is_ok(), "relay still alive after client closed");

        let mut rest = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(1), upstream.read_to_end(&mut rest))
            .await
            .expect("upstream was left open");
        assert_eq!(read.unwrap(), 0);
    }

    #[tokio::test]
    async fn relay_ends_when_upstream_closes_and_client_stays_silent() {
        let (client_side, mut client) = tokio::io::duplex(64);
        let (upstream_side, upstream) = tokio::io::duplex(64);
        let (tx, _) = broadcast::channel(1);

        let relay = tokio::spawn(relay(client_side, upstream_side, tx.subscribe()));

        drop(upstream);
        let finished = tokio::time::timeout(Duration::from_secs(2), relay).await;
        assert!(finished.is_ok(), "relay still alive after upstream closed");

        let mut rest = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(1), client.read_to_end(&mut rest))
            .await
            .expect("client was left open");
        assert_eq!(read.unwrap(), 0);
    }

    #[tokio::test]
    async fn relay_stops_on_shutdown() {
        let (client_side, _client) = tokio::io::duplex(64);
        let (upstream_side, _upstream) = tokio::io::duplex(64);
        let (tx, _) = broadcast::channel(1);

        let relay = tokio::spawn(relay(client_side, upstream_side, tx.subscribe()));
        tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), relay).await;
        assert!(result.is_ok());
    }
}
