use thiserror::Error;

use crate::config::LoadError;

/// Failures of the process surroundings: settings, logging, schema setup, stdio.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("failed to install tracing subscriber: {0}")]
    Telemetry(String),
    #[error("schema migration of `{location}` failed: {message}")]
    Migration { location: String, message: String },
    #[error("stdio error: {0}")]
    Io(#[from] std::io::Error),
}

impl InfraError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }

    pub fn migration(location: impl Into<String>, message: impl ToString) -> Self {
        Self::Migration {
            location: location.into(),
            message: message.to_string(),
        }
    }
}

impl From<LoadError> for InfraError {
    fn from(err: LoadError) -> Self {
        Self::configuration(err.to_string())
    }
}
