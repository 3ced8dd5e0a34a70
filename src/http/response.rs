//! Response handling and error mapping.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers from upstream responses
//! - Map forwarding failures to gateway status codes
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Connect timeouts and slow upstreams result in 504 Gateway Timeout
//! - Every other upstream failure is 502 Bad Gateway

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use axum::response::IntoResponse;

use crate::resilience::timeouts::ConnectError;
use crate::security::headers;

/// A failure while forwarding a single request.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("upstream unreachable: {0}")]
    Connect(#[from] ConnectError),
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
    #[error("upstream handshake failed: {0}")]
    Handshake(#[from] hyper::Error),
    #[error("could not build upstream URI: {0}")]
    Uri(#[from] axum::http::uri::InvalidUri),
    #[error("malformed upgrade request: {0}")]
    MalformedUpgrade(&'static str),
}

impl ProxyError {
    /// Status code reported to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Connect(ConnectError::TimedOut { .. }) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Upstream(e) if is_connect_timeout(e) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::MalformedUpgrade(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

fn is_connect_timeout(err: &hyper_util::client::legacy::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return io.kind() == std::io::ErrorKind::TimedOut;
        }
        source = e.source();
    }
    false
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match &self {
            ProxyError::Connect(_)
            | ProxyError::Upstream(_)
            | ProxyError::Timeout(_)
            | ProxyError::Handshake(_) => {
                "Upstream request failed"
            }
            ProxyError::Uri(_) => "Invalid upstream URI",
            ProxyError::MalformedUpgrade(reason) => *reason,
        };

        let mut response = (status, message).into_response();
        if matches!(self, ProxyError::MalformedUpgrade(_)) {
            // An aborted handshake never continues on this connection.
            response
                .headers_mut()
                .insert(header::CONNECTION, HeaderValue::from_static("close"));
        }
        response
    }
}

/// Convert an upstream response for the client, dropping hop-by-hop headers.
pub fn from_upstream<B>(response: Response<B>) -> axum::response::Response
where
    B: hyper::body::Body<Data = hyper::body::Bytes> + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    let (mut parts, body) = response.into_parts();
    headers::strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}
