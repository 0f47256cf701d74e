//! Configuration System
//!
//! Engine settings: the sentinel name for unnamed contexts, the trace banner, whether context
//! names carry their origin location, and logging. Settings are layered with the `config`
//! crate (defaults, global file, explicit file, environment) and installed process-wide.

use crate::error::SettingsError;
use crate::logging::LoggingConfig;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

mod merge;
mod sources;

pub use sources::environment::ENV_PREFIX;
pub use sources::global_file::global_config_path;

pub const DEFAULT_CONTEXT_NAME: &str = "unnamed";
pub const DEFAULT_TRACE_BANNER: &str = "    ---- dynamic context ----";

static ACTIVE: RwLock<Option<Arc<FrameConfig>>> = RwLock::new(None);

/// Root settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Name used when a context is created without one
    #[serde(default = "default_name")]
    pub default_name: String,

    /// Line separating the failure text from the context names in a trace
    #[serde(default = "default_trace_banner")]
    pub trace_banner: String,

    /// Prefix context names with `file:line:column - `
    #[serde(default = "default_true")]
    pub origin_locations: bool,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_name() -> String {
    DEFAULT_CONTEXT_NAME.to_string()
}

fn default_trace_banner() -> String {
    DEFAULT_TRACE_BANNER.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            default_name: default_name(),
            trace_banner: default_trace_banner(),
            origin_locations: default_true(),
            logging: LoggingConfig::default(),
        }
    }
}

impl FrameConfig {
    /// Validate the settings
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.default_name.trim().is_empty() {
            return Err(SettingsError::Invalid(
                "default_name cannot be empty".to_string(),
            ));
        }
        if self.trace_banner.contains('\n') {
            return Err(SettingsError::Invalid(
                "trace_banner must be a single line".to_string(),
            ));
        }
        self.logging.validate()
    }
}

/// Loads settings from the layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then the global file, then `DYNFRAME_*` environment variables
    pub fn load() -> Result<FrameConfig, SettingsError> {
        let builder = merge::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::environment::add_to_builder(builder)?;
        Self::finish(builder)
    }

    /// Defaults, then the global file, then `path`, then the environment
    pub fn load_with_file(path: &Path) -> Result<FrameConfig, SettingsError> {
        let builder = merge::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::settings_file::add_to_builder(builder, path)?;
        let builder = sources::environment::add_to_builder(builder)?;
        Self::finish(builder)
    }

    /// Defaults and `path` only
    pub fn load_from_file(path: &Path) -> Result<FrameConfig, SettingsError> {
        let builder = merge::builder_with_defaults()?;
        let builder = sources::settings_file::add_to_builder(builder, path)?;
        Self::finish(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<FrameConfig, SettingsError> {
        let settings: FrameConfig = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Make `settings` the active settings for contexts created from now on
pub fn install(settings: FrameConfig) -> Result<(), SettingsError> {
    settings.validate()?;
    *ACTIVE.write() = Some(Arc::new(settings));
    Ok(())
}

/// The active settings, or the defaults if none were installed
pub fn current() -> Arc<FrameConfig> {
    if let Some(settings) = ACTIVE.read().as_ref() {
        return Arc::clone(settings);
    }
    Arc::new(FrameConfig::default())
}

/// Drop installed settings and fall back to the defaults
pub fn reset() {
    *ACTIVE.write() = None;
}
