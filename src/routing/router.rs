//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled rules in declaration order
//! - Look up the first rule matching a request path
//! - Produce the outbound header set for a forwarded request
//! - Return an explicit `ServeLocal` when nothing matches
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in declaration order (acceptable for typical route counts)
//! - Explicit ServeLocal rather than an error for unmatched paths

use axum::http::{header, HeaderMap, HeaderValue, Request};

use crate::config::RouteConfig;
use crate::routing::matcher::{PathPattern, PatternError};
use crate::routing::upstream::{TargetError, Upstream};
use crate::security::headers;

/// Error produced when compiling the route table.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("route table is empty")]
    Empty,
    #[error("route `{route}`: {source}")]
    Pattern {
        route: String,
        #[source]
        source: PatternError,
    },
    #[error("route `{route}`: {source}")]
    Target {
        route: String,
        #[source]
        source: TargetError,
    },
}

/// A compiled forwarding rule.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub name: String,
    pub pattern: PathPattern,
    pub upstream: Upstream,
    pub change_origin: bool,
    pub ws: bool,
    pub xfwd: bool,
}

impl RouteRule {
    /// Compile a rule from its configuration.
    pub fn from_config(config: &RouteConfig) -> Result<Self, RouteError> {
        let name = config.display_name().to_string();
        let pattern = PathPattern::parse(&config.pattern).map_err(|source| RouteError::Pattern {
            route: name.clone(),
            source,
        })?;
        let upstream = Upstream::parse(&config.target).map_err(|source| RouteError::Target {
            route: name.clone(),
            source,
        })?;

        Ok(Self {
            name,
            pattern,
            upstream,
            change_origin: config.change_origin,
            ws: config.ws,
            xfwd: config.xfwd,
        })
    }
}

/// Outcome of routing a single request.
#[derive(Debug)]
pub enum Decision<'a> {
    /// Send the request to the rule's upstream with the given headers.
    Forward(Forward<'a>),
    /// No rule matched; answer from the local site.
    ServeLocal,
}

/// A forwarding decision.
#[derive(Debug)]
pub struct Forward<'a> {
    /// The rule that matched. Its upstream is the target.
    pub rule: &'a RouteRule,
    /// Outbound headers, already rewritten.
    pub headers: HeaderMap,
    /// The request asked for a protocol upgrade and the rule passes it through.
    pub upgrade: bool,
}

/// Ordered, immutable set of rules. First match wins.
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Compile routes from configuration, keeping declaration order.
    pub fn from_config(configs: &[RouteConfig]) -> Result<Self, RouteError> {
        if configs.is_empty() {
            return Err(RouteError::Empty);
        }
        let rules = configs
            .iter()
            .map(RouteRule::from_config)
            .collect::<Result<Vec<_>, _>>()?;

        for rule in &rules {
            tracing::debug!(
                route = %rule.name,
                pattern = %rule.pattern,
                target = %rule.upstream,
                change_origin = rule.change_origin,
                ws = rule.ws,
                "Route compiled"
            );
        }

        Ok(Self { rules })
    }

    /// First rule whose pattern matches the path.
    pub fn match_path(&self, path: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| rule.pattern.matches(path))
    }

    /// Decide what to do with a request.
    pub fn route<B>(&self, req: &Request<B>) -> Decision<'_> {
        let Some(rule) = self.match_path(req.uri().path()) else {
            return Decision::ServeLocal;
        };

        let upgrade = rule.ws && is_upgrade_request(req);
        let mut outbound = req.headers().clone();
        headers::strip_hop_by_hop(&mut outbound);

        if rule.change_origin {
            headers::set_host(&mut outbound, rule.upstream.authority());
        }

        if upgrade {
            if let Some(protocol) = req.headers().get(header::UPGRADE) {
                outbound.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
                outbound.insert(header::UPGRADE, protocol.clone());
            }
        }

        Decision::Forward(Forward {
            rule,
            headers: outbound,
            upgrade,
        })
    }
}

/// The request carries an `Upgrade` header.
pub fn is_upgrade_request<B>(req: &Request<B>) -> bool {
    req.headers().contains_key(header::UPGRADE)
}
