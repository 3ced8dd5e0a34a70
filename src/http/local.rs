//! Local serving for requests no route claims.
//!
//! # Responsibilities
//! - Serve built front-end assets from `local.static_dir`
//! - Fall back to the application shell for client-side routes
//! - Answer 404 when no static directory is configured

use std::convert::Infallible;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};

use crate::config::LocalConfig;

/// The local side of the proxy.
#[derive(Debug, Clone)]
pub struct LocalSite {
    assets: Option<ServeDir<ServeFile>>,
}

impl LocalSite {
    pub fn new(config: &LocalConfig) -> Self {
        let assets = config.static_dir.as_ref().map(|dir| {
            tracing::info!(static_dir = %dir.display(), index = %config.index, "Serving local assets");
            ServeDir::new(dir)
                .append_index_html_on_directories(true)
                .fallback(ServeFile::new(dir.join(&config.index)))
        });
        Self { assets }
    }

    /// A site that answers everything with 404.
    pub fn disabled() -> Self {
        Self { assets: None }
    }

    pub async fn serve(&self, req: Request<Body>) -> Response {
        let Some(assets) = &self.assets else {
            return (StatusCode::NOT_FOUND, "Not Found").into_response();
        };

        let result: Result<_, Infallible> = assets.clone().oneshot(req).await;
        match result {
            Ok(res) => res.map(Body::new),
            Err(never) => match never {},
        }
    }
}
