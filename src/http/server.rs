//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener (plain or TLS)
//! - Dispatch requests through the route table
//! - Forward matched requests to upstreams, serve the rest locally
//!
//! # Design Decisions
//! - The request timeout covers the upstream call up to the response head
//!   and maps to 504

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::http::local::LocalSite;
use crate::http::request::{RequestIdExt, RequestIdLayer};
use crate::http::response::{self, ProxyError};
use crate::http::websocket::{self, UpgradeContext};
use crate::lifecycle::shutdown;
use crate::net::connection::RelayTracker;
use crate::observability::metrics;
use crate::routing::{Decision, Forward, RouteError, RouteTable};
use crate::security::headers;

/// How long shutdown waits for live relays before exiting anyway.
const RELAY_DRAIN_DEADLINE: Duration = Duration::from_secs(5);

/// Error type for server setup and serving.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid routes: {0}")]
    Routes(#[from] RouteError),
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub client: Client<HttpConnector, Body>,
    pub local: LocalSite,
    pub upgrade: UpgradeContext,
    pub request_timeout: Duration,
    pub scheme: &'static str,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    relays: RelayTracker,
    shutdown: broadcast::Sender<()>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let routes = Arc::new(RouteTable::from_config(&config.routes)?);
        let connect_timeout = Duration::from_secs(config.timeouts.connect_secs);
        let request_timeout = Duration::from_secs(config.timeouts.request_secs);

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let relays = RelayTracker::new();
        let (shutdown, _) = broadcast::channel(1);

        let state = AppState {
            routes,
            client,
            local: LocalSite::new(&config.local),
            upgrade: UpgradeContext {
                connect_timeout,
                request_timeout,
                tracker: relays.clone(),
                shutdown: shutdown.clone(),
            },
            request_timeout,
            scheme: if config.listener.https { "https" } else { "http" },
        };

        let router = Self::build_router(state);
        Ok(Self {
            router,
            config,
            relays,
            shutdown,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(RequestIdLayer)
    }

    /// Serve plain HTTP on the given listener until `shutdown_rx` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, routes = self.config.routes.len(), "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let relay_shutdown = self.shutdown.clone();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown::wait(shutdown_rx).await;
                let _ = relay_shutdown.send(());
            })
            .await?;

        Self::drain(&self.relays).await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown_rx` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        tracing::info!(address = %addr, routes = self.config.routes.len(), "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let relay_shutdown = self.shutdown.clone();
        let signal_handle = handle.clone();
        tokio::spawn(async move {
            shutdown::wait(shutdown_rx).await;
            let _ = relay_shutdown.send(());
            signal_handle.graceful_shutdown(Some(RELAY_DRAIN_DEADLINE));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        Self::drain(&self.relays).await;
        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    async fn drain(relays: &RelayTracker) {
        if relays.active_count() > 0 && !relays.wait_idle(RELAY_DRAIN_DEADLINE).await {
            tracing::warn!(remaining = relays.active_count(), "Relays still open at shutdown");
        }
    }
}

/// Main proxy handler.
/// Routes the request, then forwards it or serves it locally.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request.request_id().to_string();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let forward = match state.routes.route(&request) {
        Decision::ServeLocal => {
            tracing::debug!(request_id = %request_id, method = %method, path = %path, "Serving locally");
            let response = state.local.serve(request).await;
            metrics::record_request(&method, response.status().as_u16(), metrics::LOCAL_ROUTE, start_time);
            return response;
        }
        Decision::Forward(forward) => forward,
    };

    let route = forward.rule.name.clone();
    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        route = %route,
        target = %forward.rule.upstream,
        upgrade = forward.upgrade,
        "Forwarding request"
    );

    let result = if forward.upgrade {
        websocket::proxy_upgrade(&state.upgrade, &request_id, forward, request).await
    } else {
        forward_http(&state, peer, forward, request).await
    };

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                tracing::error!(request_id = %request_id, route = %route, error = %e, "Upstream error");
            } else {
                tracing::warn!(request_id = %request_id, route = %route, error = %e, "Rejected request");
            }
            e.into_response()
        }
    };

    metrics::record_request(&method, response.status().as_u16(), &route, start_time);
    response
}

/// Stream a plain request to the upstream and its response back.
async fn forward_http(
    state: &AppState,
    peer: SocketAddr,
    forward: Forward<'_>,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut outbound = Request::new(body);
    *outbound.method_mut() = parts.method.clone();
    *outbound.uri_mut() = forward.rule.upstream.uri_for(path_and_query)?;
    *outbound.headers_mut() = forward.headers;

    if forward.rule.xfwd {
        headers::add_forwarded(
            outbound.headers_mut(),
            peer,
            parts.headers.get(header::HOST),
            state.scheme,
        );
    }

    let upstream_response = tokio::time::timeout(state.request_timeout, state.client.request(outbound))
        .await
        .map_err(|_| ProxyError::Timeout(state.request_timeout))??;
    Ok(response::from_upstream(upstream_response))
}
