//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("repository.flush_delay_ms must be greater than 0")]
    ZeroFlushDelay,
    #[error("repository.{0} must be greater than 0")]
    ZeroCapacity(&'static str),
    #[error("client.message_limit must be greater than 0")]
    ZeroMessageLimit,
    #[error("database.path is empty")]
    EmptyDatabasePath,
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let repo = &config.repository;

    if repo.flush_delay_ms == 0 {
        errors.push(ValidationError::ZeroFlushDelay);
    }
    for (name, capacity) in [
        ("user_cache_capacity", repo.user_cache_capacity),
        ("channel_cache_capacity", repo.channel_cache_capacity),
        ("message_cache_capacity", repo.message_cache_capacity),
    ] {
        if capacity == 0 {
            errors.push(ValidationError::ZeroCapacity(name));
        }
    }
    if config.client.message_limit == 0 {
        errors.push(ValidationError::ZeroMessageLimit);
    }

    // Database path validation
    if let Some(ref db) = config.database {
        if db.path.is_empty() {
            errors.push(ValidationError::EmptyDatabasePath);
        } else if db.path != ":memory:" {
            let db_path = Path::new(&db.path);
            if let Some(parent) = db_path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                errors.push(ValidationError::DatabasePathInvalid(db.path.clone()));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
