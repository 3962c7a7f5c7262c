use crate::models::NamespaceState;
use thiserror::Error;

/// Process exit code used when the operator declines to recreate a test namespace.
pub const EXIT_DECLINED: i32 = 1;

/// Process exit code used when recreating a test namespace fails.
pub const EXIT_RECREATE_FAILED: i32 = 2;

/// Adapter error types
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Compilation error: {0}")]
    Compilation(String),

    #[error("Lifecycle error: {message}")]
    Lifecycle { exit_code: i32, message: String },

    #[error("Invalid transition for namespace '{namespace}': {from:?} -> {to:?}")]
    InvalidTransition {
        namespace: String,
        from: NamespaceState,
        to: NamespaceState,
    },
}

impl AdapterError {
    /// Exit code the test harness should terminate with, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            AdapterError::Lifecycle { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    pub fn declined(message: impl Into<String>) -> Self {
        AdapterError::Lifecycle {
            exit_code: EXIT_DECLINED,
            message: message.into(),
        }
    }

    pub fn recreate_failed(message: impl Into<String>) -> Self {
        AdapterError::Lifecycle {
            exit_code: EXIT_RECREATE_FAILED,
            message: message.into(),
        }
    }
}

/// Convert config::ConfigError to AdapterError
impl From<config::ConfigError> for AdapterError {
    fn from(err: config::ConfigError) -> Self {
        AdapterError::Configuration(err.to_string())
    }
}

/// Convert url::ParseError to AdapterError
impl From<url::ParseError> for AdapterError {
    fn from(err: url::ParseError) -> Self {
        AdapterError::Configuration(format!("Invalid connection URL: {}", err))
    }
}
