//! Configuration validation.
//!
//! Ensures configuration values are within ranges the service can run with.

use thiserror::Error;

use crate::config::{Config, ObservabilityConfig, ScreenerConfig, ServerConfig, SourceConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration, collecting every problem.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        let sections: [&dyn Validate; 4] = [
            &self.server,
            &self.observability,
            &self.screener,
            &self.source,
        ];
        for section in sections {
            match section.validate() {
                Ok(()) => {}
                Err(ValidationError::Multiple(inner)) => errors.extend(inner),
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "server.port".to_string(),
            });
        }
        if self.host.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "server.host".to_string(),
            });
        }
        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
        const FORMATS: &[&str] = &["json", "pretty"];

        let mut errors = Vec::new();
        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            errors.push(ValidationError::InvalidValue {
                field: "observability.log_level".to_string(),
                reason: format!("must be one of {}", LEVELS.join(", ")),
            });
        }
        if !FORMATS.contains(&self.log_format.as_str()) {
            errors.push(ValidationError::InvalidValue {
                field: "observability.log_format".to_string(),
                reason: format!("must be one of {}", FORMATS.join(", ")),
            });
        }
        collect(errors)
    }
}

impl Validate for ScreenerConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if !(1..=10).contains(&self.top_n) {
            errors.push(ValidationError::InvalidValue {
                field: "screener.top_n".to_string(),
                reason: format!("{} is outside 1..=10", self.top_n),
            });
        }
        if !self.cap_limit_yi.is_finite() || self.cap_limit_yi <= 0.0 {
            errors.push(ValidationError::InvalidValue {
                field: "screener.cap_limit_yi".to_string(),
                reason: "must be a positive number".to_string(),
            });
        }
        if self.max_concurrency == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "screener.max_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.laggard_max_change_pct < 0.0 {
            errors.push(ValidationError::InvalidValue {
                field: "screener.laggard_max_change_pct".to_string(),
                reason: "laggard band starts at 0".to_string(),
            });
        }

        collect(errors)
    }
}

impl Validate for SourceConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if self.provider != "eastmoney" {
            errors.push(ValidationError::InvalidValue {
                field: "source.provider".to_string(),
                reason: format!("unknown provider '{}'", self.provider),
            });
        }
        if self.requests_per_minute == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "source.requests_per_minute".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        for (field, ttl) in [
            ("source.ranking_ttl_secs", self.ranking_ttl_secs),
            ("source.snapshot_ttl_secs", self.snapshot_ttl_secs),
            ("source.constituents_ttl_secs", self.constituents_ttl_secs),
        ] {
            if ttl < 0 {
                errors.push(ValidationError::InvalidValue {
                    field: field.to_string(),
                    reason: "must not be negative".to_string(),
                });
            }
        }

        collect(errors)
    }
}

fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}
