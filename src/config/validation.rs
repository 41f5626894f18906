//! Configuration validation.
//!
//! Serde handles syntax; this checks value ranges and names. All problems
//! are returned at once, not just the first.

use thiserror::Error;

use crate::config::schema::GuardConfig;

/// A single semantic problem in a config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
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

/// Characters a collection or database name may not contain.
const FORBIDDEN_NAME_CHARS: &[char] = &['$', '\0', '/', '\\', ' ', '"'];

fn check_name(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if value.is_empty() {
        errors.push(ValidationError::new(field, "must not be empty"));
    } else if let Some(c) = value.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
        errors.push(ValidationError::new(
            field,
            format!("must not contain {:?}", c),
        ));
    }
}

/// Validate a parsed config.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let retries = &config.retries;

    if retries.growth_factor == 0 {
        errors.push(ValidationError::new("retries.growth_factor", "must be at least 1"));
    }
    if retries.max_multiplier == 0 {
        errors.push(ValidationError::new("retries.max_multiplier", "must be at least 1"));
    }
    if !(0.0..1.0).contains(&retries.jitter_ratio) {
        errors.push(ValidationError::new(
            "retries.jitter_ratio",
            format!("must be in [0.0, 1.0), got {}", retries.jitter_ratio),
        ));
    }
    if retries.log_namespaces.iter().any(|ns| ns.is_empty()) {
        errors.push(ValidationError::new(
            "retries.log_namespaces",
            "entries must not be empty",
        ));
    }

    check_name("cache.database", &config.cache.database, &mut errors);
    check_name("cache.prefix", &config.cache.prefix, &mut errors);
    if config.cache.ttl_secs == 0 {
        errors.push(ValidationError::new("cache.ttl_secs", "must be greater than 0"));
    }

    match config.observability.log_level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" | "off" => {}
        other => errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {:?}", other),
        )),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
