//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, headers)
//!     → router.rs (route lookup, declaration order)
//!     → matcher.rs (evaluate path pattern)
//!     → Return: Forward(rule, rewritten headers) or ServeLocal
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Compile patterns (regex or literal prefix)
//!     → Parse targets (upstream.rs)
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (declaration order)

pub mod matcher;
pub mod router;
pub mod upstream;

pub use router::{is_upgrade_request, Decision, Forward, RouteError, RouteRule, RouteTable};
pub use upstream::Upstream;
