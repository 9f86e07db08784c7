//! Configuration validation.
//!
//! Serde handles syntax; this checks value ranges. All problems are
//! reported at once, not just the first.

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("backend.host must not be empty")]
    EmptyHost,

    #[error("backend.port must not be 0")]
    ZeroPort,

    #[error("retries.max_attempts must be at least 1")]
    NoAttempts,

    #[error("timeouts.{0} must be greater than 0")]
    ZeroTimeout(&'static str),

    #[error("listener.bind_address {0:?} is not a socket address")]
    BadBindAddress(String),

    #[error("rate limit for {0} allows no requests")]
    EmptyQuota(String),
}

/// Check a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backend.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if config.backend.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::NoAttempts);
    }

    let timeouts = [
        ("connect_secs", config.timeouts.connect_secs),
        ("io_secs", config.timeouts.io_secs),
        ("request_secs", config.timeouts.request_secs),
    ];
    for (name, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    if config
        .listener
        .bind_address
        .parse::<std::net::SocketAddr>()
        .is_err()
    {
        errors.push(ValidationError::BadBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.rate_limit.default.iter().any(|quota| quota.requests == 0) {
        errors.push(ValidationError::EmptyQuota("default".to_string()));
    }
    for (route, quota) in &config.rate_limit.routes {
        if quota.requests == 0 {
            errors.push(ValidationError::EmptyQuota(route.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_problem() {
        let mut config = GatewayConfig::default();
        config.backend.host = " ".into();
        config.backend.port = 0;
        config.retries.max_attempts = 0;
        config.timeouts.io_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyHost,
                ValidationError::ZeroPort,
                ValidationError::NoAttempts,
                ValidationError::ZeroTimeout("io_secs"),
            ]
        );
    }

    #[test]
    fn rejects_zero_default_quota() {
        let mut config = GatewayConfig::default();
        config.rate_limit.default.push(crate::security::Quota::per_minute(0));
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::EmptyQuota("default".into())])
        );
    }

    #[test]
    fn rejects_bad_bind_address() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "localhost".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::BadBindAddress(_)));
    }
}
