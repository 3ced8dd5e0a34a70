//! Upstream origin parsing and URI construction.

use axum::http::uri::{InvalidUri, Uri};
use url::Url;

/// Error produced when a target URL is unusable.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("invalid target URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("unsupported target scheme `{0}` (only http is supported)")]
    Scheme(String),
    #[error("target has no host")]
    MissingHost,
    #[error("target must not carry a query or fragment")]
    QueryOrFragment,
}

/// The origin matched requests are forwarded to.
#[derive(Debug, Clone)]
pub struct Upstream {
    url: Url,
    authority: String,
    base_path: String,
}

impl Upstream {
    /// Parse and check a target URL such as `http://upstream:8080`.
    pub fn parse(target: &str) -> Result<Self, TargetError> {
        let url = Url::parse(target)?;
        if url.scheme() != "http" {
            return Err(TargetError::Scheme(url.scheme().to_string()));
        }
        let host = url.host_str().ok_or(TargetError::MissingHost)?;
        if url.query().is_some() || url.fragment().is_some() {
            return Err(TargetError::QueryOrFragment);
        }

        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let base_path = url.path().trim_end_matches('/').to_string();

        Ok(Self {
            url,
            authority,
            base_path,
        })
    }

    /// Host plus any explicit port, as it belongs in a `Host` header.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// `host:port` with the scheme's default port filled in, for dialing.
    pub fn connect_address(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        let port = self.url.port_or_known_default().unwrap_or(80);
        format!("{host}:{port}")
    }

    /// Absolute URI for a request path and query on this upstream.
    pub fn uri_for(&self, path_and_query: &str) -> Result<Uri, InvalidUri> {
        format!(
            "{}://{}{}{}",
            self.url.scheme(),
            self.authority,
            self.base_path,
            path_and_query
        )
        .parse()
    }

    /// Origin-form URI (path and query only), as sent on a dedicated connection.
    pub fn origin_form_for(&self, path_and_query: &str) -> Result<Uri, InvalidUri> {
        format!("{}{}", self.base_path, path_and_query).parse()
    }
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}{}", self.url.scheme(), self.authority, self.base_path)
    }
}
