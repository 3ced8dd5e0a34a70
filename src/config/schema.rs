//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Local listener configuration (bind address, HTTPS).
    pub listener: ListenerConfig,

    /// Local serving of static assets and the application shell.
    pub local: LocalConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Ordered forwarding rules. First match wins.
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Serve HTTPS instead of plain HTTP. Requires `tls`.
    pub https: bool,

    /// Certificate material used when `https` is set.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            https: false,
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Where requests that match no route are served from.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Directory holding the built front-end. `None` answers 404 locally.
    pub static_dir: Option<PathBuf>,

    /// Application shell served for paths with no matching file.
    pub index: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            static_dir: None,
            index: "index.html".to_string(),
        }
    }
}

/// A single forwarding rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Rule identifier for logging/metrics. Defaults to the pattern.
    #[serde(default)]
    pub name: Option<String>,

    /// Path match expression. A leading `^` makes it a regular expression,
    /// anything else is a literal prefix.
    pub pattern: String,

    /// Upstream origin, e.g. "http://127.0.0.1:8000".
    pub target: String,

    /// Rewrite the outbound `Host` header to the target's authority.
    #[serde(default, alias = "changeOrigin")]
    pub change_origin: bool,

    /// Pass protocol upgrades (WebSocket) through to the target.
    #[serde(default)]
    pub ws: bool,

    /// Add `X-Forwarded-For`, `X-Forwarded-Proto` and `X-Forwarded-Host`.
    #[serde(default)]
    pub xfwd: bool,
}

impl RouteConfig {
    /// Shorthand used by tests and programmatic setups.
    pub fn new(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: None,
            pattern: pattern.into(),
            target: target.into(),
            change_origin: false,
            ws: false,
            xfwd: false,
        }
    }

    /// The name used in logs and metrics.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.pattern)
    }
}

/// Timeout configuration for upstream operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for the upstream to produce a response head, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Human readable or JSON lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
