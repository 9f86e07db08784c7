//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

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

/// Parse a TOML configuration file without validating it.
pub fn read_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Override file values with `MPD_HOST`, `MPD_PORT`, `MPD_PASSWORD` and
/// `MPD_GATEWAY_BIND`.
///
/// `lookup` is `std::env::var(..).ok()` in production. An empty
/// `MPD_PASSWORD` means no password.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("MPD_HOST") {
        config.backend.host = host;
    }

    if let Some(port) = lookup("MPD_PORT") {
        config.backend.port = port.trim().parse().map_err(|_| ConfigError::Env {
            var: "MPD_PORT",
            value: port.clone(),
        })?;
    }

    if let Some(password) = lookup("MPD_PASSWORD") {
        config.backend.password = if password.is_empty() {
            None
        } else {
            Some(password)
        };
    }

    if let Some(bind) = lookup("MPD_GATEWAY_BIND") {
        config.listener.bind_address = bind;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validation::validate_config;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn loads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[backend]\nhost = \"10.0.0.2\"\nport = 6601\n\n[retries]\nmax_attempts = 5"
        )
        .unwrap();

        let config = read_config(file.path()).unwrap();
        assert_eq!(config.backend.host, "10.0.0.2");
        assert_eq!(config.backend.port, 6601);
        assert_eq!(config.retries.max_attempts, 5);
    }

    #[test]
    fn file_values_are_validated_separately() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retries]\nmax_attempts = 0").unwrap();

        let config = read_config(file.path()).unwrap();
        assert_eq!(validate_config(&config).unwrap_err().len(), 1);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[backend]\nport = \"sixty\"").unwrap();
        assert!(matches!(read_config(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = read_config(Path::new("/nonexistent/mpd-gateway.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("MPD_HOST", "music.lan"),
                ("MPD_PORT", "6700"),
                ("MPD_PASSWORD", "secret"),
            ]),
        )
        .unwrap();

        assert_eq!(config.backend.host, "music.lan");
        assert_eq!(config.backend.port, 6700);
        assert_eq!(config.backend.password.as_deref(), Some("secret"));
    }

    #[test]
    fn empty_password_means_none() {
        let mut config = GatewayConfig::default();
        config.backend.password = Some("old".into());
        apply_env_overrides(&mut config, env(&[("MPD_PASSWORD", "")])).unwrap();
        assert!(config.backend.password.is_none());
    }

    #[test]
    fn bad_port_is_reported() {
        let mut config = GatewayConfig::default();
        let result = apply_env_overrides(&mut config, env(&[("MPD_PORT", "sixty")]));
        assert!(matches!(result, Err(ConfigError::Env { var: "MPD_PORT", .. })));
    }
}
