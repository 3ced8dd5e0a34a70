//! Path-prefix forwarding proxy.
//!
//! Sits in front of a browser application during development. Requests whose
//! path matches a configured pattern go to an upstream origin; everything else
//! is served from the local build directory.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌───────────────────────────────────────────────┐
//!                              │                PREFIX PROXY                   │
//!                              │                                               │
//!     Client Request           │  ┌─────────┐    ┌─────────┐    ┌──────────┐   │
//!     ─────────────────────────┼─▶│ net/tls │───▶│  http   │───▶│ routing  │   │
//!                              │  │         │    │ server  │    │  table   │   │
//!                              │  └─────────┘    └─────────┘    └────┬─────┘   │
//!                              │                                     │         │
//!                              │                     ServeLocal ◀────┴───▶ Forward
//!                              │                         │                │    │
//!                              │                  ┌──────▼─────┐  ┌───────▼──┐ │
//!     Client Response          │                  │ local site │  │ upstream │─┼──── Upstream
//!     ◀────────────────────────┼──────────────────│ (assets)   │  │ client / │ │     Origin
//!                              │                  └────────────┘  │  relay   │ │
//!                              │                                  └──────────┘ │
//!                              └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use prefix_proxy::config::load_config;
use prefix_proxy::lifecycle::{signals, startup, Shutdown};
use prefix_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "prefix-proxy")]
#[command(about = "Forward path-prefixed requests to an upstream, serve the rest locally", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "proxy.toml")]
    config: PathBuf,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        bind_address = %config.listener.bind_address,
        https = config.listener.https,
        routes = config.routes.len(),
        "prefix-proxy starting"
    );

    let shutdown = Shutdown::new();
    signals::forward_signals(shutdown.clone());

    startup::run(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
