//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ClientConfig, DatabaseConfig)
//! - [`repository`]: Cache capacities and flush timing (RepositoryConfig)
//! - [`validation`]: Startup validation collecting every problem at once

mod repository;
mod types;
mod validation;

pub use repository::RepositoryConfig;
pub use types::{ClientConfig, Config, ConfigError, DatabaseConfig};
pub use validation::{ValidationError, validate};
