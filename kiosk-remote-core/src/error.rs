use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::literal::LiteralError;

/// Errors produced while dispatching a remote request.
///
/// Every variant maps onto one of three outcomes for the caller: a
/// validation failure (nothing was attempted), an execution failure (a side
/// effect was attempted and failed, possibly half way), or a precondition
/// failure such as the display process not having reported in yet.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("{0}")]
    Validation(String),

    #[error(
        "Not initialized, have you opened or refreshed your browser since the last time you started the display?"
    )]
    NotInitialized,

    #[error("{message}")]
    Execution {
        message: String,
        stdout: Option<String>,
        stderr: Option<String>,
    },

    #[error("Command timed out after {}ms: {command}", timeout.as_millis())]
    CommandTimeout { command: String, timeout: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Literal error: {0}")]
    Literal(#[from] LiteralError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

impl RemoteError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        RemoteError::Validation(message.into())
    }

    pub fn execution<S: Into<String>>(message: S) -> Self {
        RemoteError::Execution {
            message: message.into(),
            stdout: None,
            stderr: None,
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        RemoteError::Internal(message.into())
    }

    /// Short machine-readable reason used in the `reason` field of error responses.
    pub fn reason(&self) -> &'static str {
        match self {
            RemoteError::Validation(_) => "invalid_request",
            RemoteError::NotInitialized => "not_initialized",
            RemoteError::Execution { .. } | RemoteError::CommandTimeout { .. } => {
                "execution_failed"
            }
            _ => "unknown",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, RemoteError::Validation(_))
    }
}
