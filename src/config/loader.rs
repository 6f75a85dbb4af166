//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Values given on the command line, taking precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub cache_dir: Option<String>,
    pub log_level: Option<String>,
}

/// Apply `overrides` and validate the result.
///
/// Used for file and default configurations alike.
pub fn apply_overrides(
    mut config: ProxyConfig,
    overrides: ConfigOverrides,
) -> Result<ProxyConfig, ConfigError> {
    if let Some(bind) = overrides.bind_address {
        config.listener.bind_address = bind;
    }
    if let Some(dir) = overrides.cache_dir {
        config.cache.root_dir = dir;
    }
    if let Some(level) = overrides.log_level {
        config.observability.log_level = level;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy.toml");
        fs::write(
            &path,
            "[listener]\nbind_address = \"127.0.0.1:0\"\n[cache]\nexpire_secs = 30\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:0");
        assert_eq!(config.cache.expire_secs, 30);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn syntax_and_semantic_errors_are_distinguished() {
        assert!(matches!(parse_config("[cache"), Err(ConfigError::Parse(_))));

        let err = parse_config("[cache]\nbuffer_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref v) if v.len() == 1));
        assert!(err.to_string().contains("cache.buffer_size"));
    }

    #[test]
    fn overrides_win_over_file_values() {
        let base = parse_config("[listener]\nbind_address = \"127.0.0.1:8080\"\n").unwrap();
        let overrides = ConfigOverrides {
            bind_address: Some("127.0.0.1:9999".into()),
            cache_dir: Some("/tmp/proxy-cache".into()),
            log_level: None,
        };

        let config = apply_overrides(base, overrides).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9999");
        assert_eq!(config.cache.root_dir, "/tmp/proxy-cache");
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn bad_override_is_rejected() {
        let overrides = ConfigOverrides {
            bind_address: Some("not-an-address".into()),
            cache_dir: Some("  ".into()),
            ..ConfigOverrides::default()
        };

        let err = apply_overrides(ProxyConfig::default(), overrides).unwrap_err();
        match err {
            ConfigError::Validation(errors) => {
                assert!(errors.contains(&ValidationError::EmptyCacheDir));
                assert!(errors.iter().any(|e| matches!(
                    e,
                    ValidationError::InvalidAddress { field: "listener.bind_address", .. }
                )));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(apply_overrides(ProxyConfig::default(), ConfigOverrides::default()).is_ok());
    }
}
