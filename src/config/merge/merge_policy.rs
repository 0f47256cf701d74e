//! Merge rules: defaults first, then the global file, the explicit file and the environment.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

use crate::config::{DEFAULT_CONTEXT_NAME, DEFAULT_TRACE_BANNER};

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("default_name", DEFAULT_CONTEXT_NAME)?
        .set_default("trace_banner", DEFAULT_TRACE_BANNER)?
        .set_default("origin_locations", true)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")?
        .set_default("logging.color", true)
}
