//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics endpoint when enabled
//! - Build the server from validated configuration
//! - Bind the listener (plain or TLS) and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;

use tokio::net::TcpListener;

use crate::config::ProxyConfig;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::net::tls::load_tls_config;
use crate::observability::metrics;

/// Run the proxy until `shutdown` is triggered.
pub async fn run(config: ProxyConfig, shutdown: &Shutdown) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    for route in &config.routes {
        tracing::info!(
            pattern = %route.pattern,
            target = %route.target,
            change_origin = route.change_origin,
            ws = route.ws,
            "Route loaded"
        );
    }

    let addr: SocketAddr = config.listener.bind_address.parse()?;
    let tls = match (config.listener.https, &config.listener.tls) {
        (true, Some(tls)) => {
            Some(load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?)
        }
        (true, None) => return Err("listener.https requires listener.tls".into()),
        (false, _) => None,
    };

    let server = HttpServer::new(config)?;
    let shutdown_rx = shutdown.subscribe();

    match tls {
        Some(tls) => server.run_tls(addr, tls, shutdown_rx).await?,
        None => {
            let listener = TcpListener::bind(addr).await?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");
            server.run(listener, shutdown_rx).await?;
        }
    }

    Ok(())
}
