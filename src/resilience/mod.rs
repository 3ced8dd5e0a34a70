//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (enforce connect timeout)
//!     → On failure: gateway error to the client, request ends
//! ```
//!
//! # Design Decisions
//! - Every upstream connect has a deadline
//! - No retries: the calling client decides whether to try again

pub mod timeouts;
