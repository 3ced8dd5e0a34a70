//! Header manipulation for forwarded traffic.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers (RFC 9110 §7.6.1), including `Connection` tokens
//! - Rewrite `Host` for origin-changing rules
//! - Add X-Forwarded-For, X-Forwarded-Proto, X-Forwarded-Host (opt-in)
//! - Detect protocol upgrade requests
//!
//! # Design Decisions
//! - Existing X-Forwarded-For values are appended to, not replaced
//! - Upgrade headers are removed like any hop-by-hop header and re-added
//!   only by the upgrade path

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Standard hop-by-hop headers. Compared lowercase.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

fn connection_tokens(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Returns true if `Connection` lists the given token (case-insensitive).
pub fn connection_has_token(headers: &HeaderMap, token: &str) -> bool {
    connection_tokens(headers).iter().any(|t| t == token)
}

/// Remove hop-by-hop headers and anything named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for token in connection_tokens(headers) {
        if let Ok(name) = HeaderName::from_bytes(token.as_bytes()) {
            headers.remove(name);
        }
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Replace `Host` with the upstream authority.
pub fn set_host(headers: &mut HeaderMap, authority: &str) {
    if let Ok(value) = HeaderValue::from_str(authority) {
        headers.insert(header::HOST, value);
    }
}

/// Append the client address and record the original host and scheme.
///
/// `original_host` is the `Host` the client sent, captured before any rewrite.
pub fn add_forwarded(
    headers: &mut HeaderMap,
    peer: SocketAddr,
    original_host: Option<&HeaderValue>,
    scheme: &str,
) {
    let client_ip = peer.ip().to_string();
    let forwarded_for = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {client_ip}"),
        None => client_ip,
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert(X_FORWARDED_FOR, value);
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static(scheme_value(scheme)));
    if let Some(host) = original_host {
        headers.insert(X_FORWARDED_HOST, host.clone());
    }
}

fn scheme_value(scheme: &str) -> &'static str {
    if scheme == "https" {
        "https"
    } else {
        "http"
    }
}
