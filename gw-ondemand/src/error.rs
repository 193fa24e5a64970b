//! Error types for control-plane operations.
//!
//! Oracle failures never show up here: they degrade the activity sample
//! instead (see [`crate::oracle`]).

use thiserror::Error;

/// Result type alias for control-plane operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors surfaced by the resource backend and the lifecycle actuator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    /// The instance does not exist or its ID is malformed.
    #[error("instance not found: {0}")]
    NotFound(String),

    /// The caller's credentials do not permit the operation.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Any other control-plane failure, tagged with the provider's error code.
    #[error("provider error {code}: {message}")]
    Provider {
        /// Provider error code, e.g. `IncorrectInstanceState`
        code: String,
        /// Provider error message
        message: String,
    },

    /// Start was issued but the instance never reached `running`.
    #[error("instance {instance_id} did not reach running after {attempts} attempts")]
    WaitTimeout {
        /// Instance that was being started
        instance_id: String,
        /// Polls made before giving up
        attempts: u32,
    },

    /// Caller-supplied input was rejected before reaching the provider.
    #[error("{0}")]
    Validation(String),

    /// Unexpected local failure (SDK transport, unexpected provider output).
    #[error("{0}")]
    Internal(String),
}

impl ControlError {
    /// HTTP status the control API answers with for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ControlError::Authorization(_) => 403,
            ControlError::NotFound(_) => 404,
            ControlError::Validation(_) => 400,
            ControlError::Provider { .. }
            | ControlError::WaitTimeout { .. }
            | ControlError::Internal(_) => 500,
        }
    }

    /// Machine-readable `error` tag of the control API error body
    pub fn error_tag(&self) -> &str {
        match self {
            ControlError::Authorization(_) => "Forbidden",
            ControlError::NotFound(_) => "NotFound",
            ControlError::Validation(_) => "ValidationError",
            ControlError::Provider { code, .. } => code,
            ControlError::WaitTimeout { .. } | ControlError::Internal(_) => "InternalError",
        }
    }
}
