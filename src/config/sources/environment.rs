//! Environment variable source: REBUS_ prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "REBUS";

/// Add environment variable overlay to builder.
/// `REBUS__STORAGE__BACKEND=diskstorage` sets `storage.backend`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    ))
}
