//! Error types for `topicbus`.
//!
//! Publishing and subscribing never fail, so the variants here only cover
//! configuration problems and handler failures surfaced after the fact
//! (for example from a [`FailureCollector`](crate::failure::FailureCollector)).

use thiserror::Error;

use crate::failure::HandlerFailure;

/// Errors produced by `topicbus`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TopicbusError {
    /// Configuration sources could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration was read but holds a value we cannot use.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A subscriber failed while handling a published payload.
    #[error(transparent)]
    Handler(#[from] HandlerFailure),
}

impl TopicbusError {
    /// Short stable label, handy as a log field.
    pub fn as_label(&self) -> &'static str {
        match self {
            TopicbusError::Config(_) => "config",
            TopicbusError::InvalidConfig(_) => "invalid_config",
            TopicbusError::Handler(_) => "handler",
        }
    }
}
