//! Unified error types for random-arts-bot

use thiserror::Error;

/// Process exit code for a clean stop
pub const EXIT_OK: i32 = 0;

/// Process exit code when configuration fails before registration
pub const EXIT_CONFIGURATION: i32 = 2;

/// Process exit code when the worker fails to start
pub const EXIT_START_FAILURE: i32 = 3;

/// Process exit code when the service host itself fails
pub const EXIT_HOST_FAILURE: i32 = 4;

/// Main error type for bot lifecycle operations
#[derive(Error, Debug)]
pub enum BotError {
    /// Invalid identity or missing required setup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Worker failed during start
    #[error("Worker '{identity}' failed to start: {message}")]
    StartFailure { identity: String, message: String },

    /// Worker failed or timed out during stop
    #[error("Worker '{identity}' failed to stop: {message}")]
    StopFailure { identity: String, message: String },

    /// Logging could not be configured as requested
    #[error("Logging initialization failed: {0}")]
    LoggingInit(String),

    /// Lifecycle call made in a state that does not allow it
    #[error("Cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: String },

    /// Service host or service manager error
    #[error("Service host error: {0}")]
    Host(String),

    /// Worker already running
    #[error("Worker already running")]
    AlreadyRunning,

    /// Config file error
    #[error(transparent)]
    Config(#[from] crate::service::config::ConfigError),
}

/// Result type alias for bot operations
pub type Result<T> = std::result::Result<T, BotError>;

impl BotError {
    /// Create a start failure from any displayable cause
    pub fn start_failure(identity: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::StartFailure {
            identity: identity.into(),
            message: format!("{:#}", cause),
        }
    }

    /// Create a stop failure from any displayable cause
    pub fn stop_failure(identity: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::StopFailure {
            identity: identity.into(),
            message: format!("{:#}", cause),
        }
    }

    /// Process exit code for this failure class
    pub fn exit_code(&self) -> i32 {
        match self {
            BotError::Configuration(_) | BotError::Config(_) => EXIT_CONFIGURATION,
            BotError::StartFailure { .. } | BotError::AlreadyRunning => EXIT_START_FAILURE,
            BotError::InvalidTransition { .. }
            | BotError::Host(_)
            | BotError::StopFailure { .. }
            | BotError::LoggingInit(_) => EXIT_HOST_FAILURE,
        }
    }

    /// Check if this error must stop the process before registration
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::Configuration(_) | BotError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_distinct_per_class() {
        let config = BotError::Configuration("empty identity".into()).exit_code();
        let start = BotError::start_failure("@bot", "boom").exit_code();
        let host = BotError::Host("dispatcher".into()).exit_code();

        assert_ne!(config, EXIT_OK);
        assert_ne!(start, EXIT_OK);
        assert_ne!(config, start);
        assert_ne!(start, host);
        assert_ne!(config, host);
    }

    #[test]
    fn test_start_failure_keeps_cause_chain() {
        let cause = anyhow::anyhow!("socket closed").context("connecting to feed");
        let err = BotError::start_failure("@bot", cause);
        let text = err.to_string();
        assert!(text.contains("@bot"));
        assert!(text.contains("connecting to feed"));
        assert!(text.contains("socket closed"));
    }

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(BotError::Configuration("x".into()).is_fatal());
        assert!(!BotError::stop_failure("@bot", "late").is_fatal());
    }
}
