//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every route compiles (pattern and target)
//! - Validate value ranges (timeouts > 0, bind address valid)
//! - Check the listener's HTTPS settings are complete
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;
use crate::routing::matcher::PathPattern;
use crate::routing::upstream::Upstream;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no routes configured")]
    NoRoutes,
    #[error("route `{route}`: {reason}")]
    Pattern { route: String, reason: String },
    #[error("route `{route}`: {reason}")]
    Target { route: String, reason: String },
    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),
    #[error("listener.https is set but listener.tls is missing")]
    MissingTls,
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.routes.is_empty() {
        errors.push(ValidationError::NoRoutes);
    }

    for route in &config.routes {
        if let Err(e) = PathPattern::parse(&route.pattern) {
            errors.push(ValidationError::Pattern {
                route: route.display_name().to_string(),
                reason: e.to_string(),
            });
        }
        if let Err(e) = Upstream::parse(&route.target) {
            errors.push(ValidationError::Target {
                route: route.display_name().to_string(),
                reason: e.to_string(),
            });
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.https && config.listener.tls.is_none() {
        errors.push(ValidationError::MissingTls);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
