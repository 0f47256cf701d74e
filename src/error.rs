//! Error types for the dynamic-context engine.

use crate::frame::registry::WrapperId;
use thiserror::Error;

/// Construction errors, raised synchronously by `create_context` and `DynamicCell::declare`
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Context body is required")]
    MissingBody,

    #[error("Reuse cannot be combined with an error handler")]
    ReuseWithHandler,

    #[error("Reuse cannot be combined with binding declarations")]
    ReuseWithBindings,

    #[error("Reuse target {0} is not a live context")]
    InvalidReuse(WrapperId),

    #[error("Unknown binding: {0}")]
    UnknownBinding(String),

    #[error("Binding already declared: {0}")]
    DuplicateBinding(String),
}

/// Settings loading and validation errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Configuration error: {0}")]
    Load(String),

    #[error("Invalid setting: {0}")]
    Invalid(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl From<config::ConfigError> for SettingsError {
    fn from(err: config::ConfigError) -> Self {
        SettingsError::Load(err.to_string())
    }
}
