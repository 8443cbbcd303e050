use serde::Deserialize;

use crate::utils::TopicbusError;
use crate::utils::logging::parse_level;

/// Top-level configuration settings.
///
/// Includes settings for logging and for dispatchers built with
/// [`Dispatcher::from_settings`](crate::Dispatcher::from_settings).
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub dispatcher: DispatcherSettings,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// `error`, `warn`, `info`, `debug` or `trace`.
    pub level: String,
}

/// Configuration settings for a dispatcher.
///
/// Controls where subscriber failures are reported.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DispatcherSettings {
    /// Report failures as `tracing` warnings.
    pub log_failures: bool,
    /// Keep recent failures in a `FailureCollector`.
    pub collect_failures: bool,
    /// Capacity of that collector.
    pub failure_history: usize,
}

/// Partial configuration settings loaded from files or environment.
///
/// Every field is optional. Missing values are filled from
/// the defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub logging: Option<PartialLoggingSettings>,
    pub dispatcher: Option<PartialDispatcherSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialDispatcherSettings {
    pub log_failures: Option<bool>,
    pub collect_failures: Option<bool>,
    pub failure_history: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logging: LoggingSettings {
                level: "info".to_string(),
            },
            dispatcher: DispatcherSettings::default(),
        }
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            log_failures: true,
            collect_failures: false,
            failure_history: 256,
        }
    }
}

impl Settings {
    /// Fills every value missing from `partial` with its default.
    pub fn merge(partial: PartialSettings) -> Self {
        let default = Settings::default();
        let logging = partial.logging.unwrap_or_default();
        let dispatcher = partial.dispatcher.unwrap_or_default();

        Settings {
            logging: LoggingSettings {
                level: logging.level.unwrap_or(default.logging.level),
            },
            dispatcher: DispatcherSettings {
                log_failures: dispatcher
                    .log_failures
                    .unwrap_or(default.dispatcher.log_failures),
                collect_failures: dispatcher
                    .collect_failures
                    .unwrap_or(default.dispatcher.collect_failures),
                failure_history: dispatcher
                    .failure_history
                    .unwrap_or(default.dispatcher.failure_history),
            },
        }
    }

    /// Rejects values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<(), TopicbusError> {
        if parse_level(&self.logging.level).is_none() {
            return Err(TopicbusError::InvalidConfig(format!(
                "unknown logging.level '{}'",
                self.logging.level
            )));
        }
        if self.dispatcher.collect_failures && self.dispatcher.failure_history == 0 {
            return Err(TopicbusError::InvalidConfig(
                "dispatcher.failure_history must be at least 1 when collect_failures is on"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
