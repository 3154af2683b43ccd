mod settings;

use config::{Config, Environment, File};

use crate::utils::Result;

pub use settings::{BrokerSettings, PartialSettings, ServerSettings, Settings};

/// Environment variables look like `PUBSUB__SERVER__PORT=6000`.
pub const ENV_PREFIX: &str = "PUBSUB";

/// Loads the configuration from `config/default` and environment variables
/// Merges the configuration with default values
pub fn load_config() -> Result<Settings> {
    load_config_from("config/default")
}

/// Same as `load_config` with an explicit base file (extension optional).
pub fn load_config_from(path: &str) -> Result<Settings> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge_with_defaults())
}

#[cfg(test)]
mod tests;
