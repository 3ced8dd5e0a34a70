//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEV_SERVER: &str = r#"
        [listener]
        bind_address = "127.0.0.1:8443"

        [local]
        static_dir = "dist"

        [[routes]]
        pattern = "^/api"
        target = "http://upstream:8080"
        changeOrigin = true
        ws = true

        [[routes]]
        pattern = "^/auth"
        target = "http://upstream:8080"
        change_origin = true
    "#;

    #[test]
    fn parses_routes_in_declaration_order() {
        let config = parse_config(DEV_SERVER).unwrap();

        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[0].pattern, "^/api");
        assert!(config.routes[0].change_origin);
        assert!(config.routes[0].ws);
        assert_eq!(config.routes[1].pattern, "^/auth");
        assert!(!config.routes[1].ws);
        assert_eq!(config.local.index, "index.html");
        assert_eq!(config.timeouts.connect_secs, 5);
    }

    #[test]
    fn shipped_config_is_valid() {
        let config = parse_config(include_str!("../../proxy.toml")).unwrap();

        let patterns: Vec<_> = config.routes.iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(patterns, ["^/api", "^/auth", "^/admin", "^/static"]);
        assert!(config.routes.iter().all(|r| r.change_origin && r.ws));
        assert!(config.listener.https);
    }

    #[test]
    fn rejects_invalid_toml() {
        let err = parse_config("[[routes]]\npattern = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn reports_validation_failures() {
        let err = parse_config("[listener]\nbind_address = \"127.0.0.1:1\"").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors, vec![ValidationError::NoRoutes]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
