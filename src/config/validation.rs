//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges against HTTP/2 limits (RFC 9113 §6.5.2)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ServerConfig;

const MIN_FRAME_SIZE: u32 = 16_384;
const MAX_FRAME_SIZE: u32 = 16_777_215;
const MAX_WINDOW_SIZE: u32 = (1 << 31) - 1;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a deserialized configuration for semantic errors.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.key_path", "must not be empty"));
        }
    }

    let h2 = &config.h2;
    if !(MIN_FRAME_SIZE..=MAX_FRAME_SIZE).contains(&h2.max_frame_size) {
        errors.push(ValidationError::new(
            "h2.max_frame_size",
            format!("must be within {MIN_FRAME_SIZE}..={MAX_FRAME_SIZE}"),
        ));
    }
    if h2.initial_window_size > MAX_WINDOW_SIZE {
        errors.push(ValidationError::new(
            "h2.initial_window_size",
            format!("must not exceed {MAX_WINDOW_SIZE}"),
        ));
    }
    if h2.connection_window_size > MAX_WINDOW_SIZE {
        errors.push(ValidationError::new(
            "h2.connection_window_size",
            format!("must not exceed {MAX_WINDOW_SIZE}"),
        ));
    }
    if h2.max_concurrent_streams == 0 {
        errors.push(ValidationError::new("h2.max_concurrent_streams", "must be greater than 0"));
    }
    if h2.keep_alive_interval_secs == Some(0) {
        errors.push(ValidationError::new("h2.keep_alive_interval_secs", "must be greater than 0"));
    }

    let observability = &config.observability;
    if observability.connection_id_prefix.is_empty() {
        errors.push(ValidationError::new(
            "observability.connection_id_prefix",
            "must not be empty",
        ));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
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
    fn defaults_are_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = ServerConfig::default();
        config.listener.max_connections = 0;
        config.h2.max_frame_size = 1024;
        config.h2.initial_window_size = u32::MAX;
        config.observability.connection_id_prefix.clear();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.max_connections",
                "h2.max_frame_size",
                "h2.initial_window_size",
                "observability.connection_id_prefix",
            ]
        );
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = ServerConfig::default();
        config.observability.metrics_address = "nowhere".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "observability.metrics_address");
    }
}
