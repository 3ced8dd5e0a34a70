//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → tls.rs (optional TLS handshake, when listener.https is set)
//!     → Hand off to HTTP layer
//!
//! Upgraded connection
//!     → connection.rs (connection id, live relay count)
//! ```
//!
//! # Design Decisions
//! - TLS is optional and handled transparently
//! - Each relay tracked for graceful shutdown

pub mod connection;
pub mod tls;
