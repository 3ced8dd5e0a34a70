//! Header hygiene for forwarded traffic.
//!
//! # Data Flow
//! ```text
//! Matched request:
//!     → headers.rs (strip hop-by-hop, rewrite Host, X-Forwarded-*)
//!     → forwarded upstream
//!
//! Upstream response:
//!     → headers.rs (strip hop-by-hop)
//!     → returned to client
//! ```

pub mod headers;
