//! Configuration parsing, environment overrides and validation.

pub mod env;
pub mod parser;
pub mod types;
pub mod validate;

use std::path::Path;

use crate::common::error::ConfigError;

pub use types::*;

/// Load the config file, apply environment overrides, then validate.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let config = parser::load_config(path)?;
    let config = env::apply_env_overrides(config);
    validate::validate_config(&config)?;
    Ok(config)
}
