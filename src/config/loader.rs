//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ExchangeConfig;
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

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<ExchangeConfig, ConfigError> {
    let config: ExchangeConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ExchangeConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ServiceMode;
    use std::io::Write;

    const SAMPLE: &str = r#"
[listener]
bind_address = "0.0.0.0:7777"

[listener.tls]
cert_path = "/etc/wge/server.pem"
key_path = "/etc/wge/server.key"

[tunnel]
interface_name = "wg1"
endpoint = "203.0.113.7:51820"
dns = ["9.9.9.9", "2620:fe::fe"]

[interface]
address = ["10.8.0.1/24", "fd00:8::1/120"]
post_up = ["iptables -A FORWARD -i %i -j ACCEPT"]

[processor]
config_dir = "/tmp/wge"
queue_capacity = 5

[service]
mode = "systemctl"

[lifecycle]
ttl_secs = 3600
"#;

    #[test]
    fn test_load_sample_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.tunnel.interface_name, "wg1");
        assert_eq!(config.tunnel.dns.len(), 2);
        assert_eq!(config.interface.address[1].to_string(), "fd00:8::1/120");
        assert_eq!(config.processor.queue_capacity, 5);
        // Unset fields keep their defaults.
        assert_eq!(config.processor.tick_ms, 1000);
        assert_eq!(config.processor.restart_debounce_secs, 60);
        assert_eq!(config.service.mode, ServiceMode::Systemctl);
        assert_eq!(config.lifecycle.ttl_secs, 3600);
        assert!(config.listener.tls.is_some());
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[tunnel\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_bad_prefix_is_parse_error() {
        let err = parse_config("[interface]\naddress = [\"10.8.0.1\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_errors_are_joined() {
        let err = parse_config("").unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("Validation failed: tunnel.endpoint"));
        assert!(text.contains(", tunnel.dns"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/server.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
