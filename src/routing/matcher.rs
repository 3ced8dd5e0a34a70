//! Path matching logic.
//!
//! # Responsibilities
//! - Match the request path against a rule's pattern
//! - Support caret-anchored regular expressions (`^/api`)
//! - Support literal prefixes (`/api`)
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Patterns are compiled once at startup, never per request
//! - A pattern is a regex only when it starts with `^`

use regex::Regex;

/// Error produced when a pattern cannot be compiled.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,
    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),
}

/// A compiled path match expression.
#[derive(Debug, Clone)]
pub enum PathPattern {
    /// Regular expression, tested against the whole path.
    Regex(Regex),
    /// Literal prefix.
    Prefix(String),
}

impl PathPattern {
    /// Compile a pattern from its configuration text.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        if pattern.starts_with('^') {
            Ok(Self::Regex(Regex::new(pattern)?))
        } else {
            Ok(Self::Prefix(pattern.to_string()))
        }
    }

    /// Returns true if the path satisfies this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Regex(re) => re.is_match(path),
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }

    /// The pattern text as configured.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Regex(re) => re.as_str(),
            Self::Prefix(prefix) => prefix.as_str(),
        }
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
