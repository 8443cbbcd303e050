//! Settings loading.
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults ([`Settings::default`])
//! 2. `config/default.{toml,yaml,json,...}` relative to the working directory
//!    (optional), or an explicit file passed to [`load_config_from`]
//! 3. environment variables prefixed with `TOPICBUS_`, nested keys separated
//!    by `__` (e.g. `TOPICBUS_DISPATCHER__FAILURE_HISTORY=64`); a `.env` file
//!    is read first when present

mod settings;

use std::path::Path;

use config::{Config, Environment, File};
use tracing::{debug, warn};

pub use settings::{
    DispatcherSettings, LoggingSettings, PartialDispatcherSettings, PartialLoggingSettings,
    PartialSettings, Settings,
};

use crate::utils::TopicbusError;

/// Loads the configuration from the default file and environment variables.
pub fn load_config() -> Result<Settings, TopicbusError> {
    load(File::with_name("config/default").required(false))
}

/// Like [`load_config`] but reads the given file, which must exist.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Settings, TopicbusError> {
    load(File::from(path.as_ref()).required(true))
}

fn load<S>(file: S) -> Result<Settings, TopicbusError>
where
    S: config::Source + Send + Sync + 'static,
{
    load_dotenv();

    let config = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix("TOPICBUS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Try to deserialize what is available, then merge with defaults
    let partial: PartialSettings = config.try_deserialize()?;
    let settings = Settings::merge(partial);
    settings.validate()?;
    Ok(settings)
}

/// Reads `.env` from the working directory if there is one.
///
/// A missing file is normal; an unreadable or malformed one is logged and
/// otherwise ignored, so settings still come from the remaining sources.
fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("ignoring .env file: {e}"),
    }
}

#[cfg(test)]
mod tests;
