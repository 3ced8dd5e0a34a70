//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (add request ID)
//!     → routing decides: Forward or ServeLocal
//!         Forward, plain    → server.rs forward_http (pooled client)
//!         Forward, upgrade  → websocket.rs (dedicated connection, relay)
//!         ServeLocal        → local.rs (static assets, app shell)
//!     → response.rs (strip hop-by-hop, map errors)
//!     → Send to client
//! ```

pub mod local;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::{RequestId, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use response::ProxyError;
pub use server::{HttpServer, ServerError};
