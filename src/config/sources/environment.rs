//! Environment overrides: DYNFRAME_TRACE_BANNER, DYNFRAME_LOGGING__LEVEL, ...

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

pub const ENV_PREFIX: &str = "DYNFRAME";

/// Add `DYNFRAME_*` variables to builder; `__` separates nested keys.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    ))
}
