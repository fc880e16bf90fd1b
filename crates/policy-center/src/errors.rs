use slotpilot_core_types::PilotError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid policy: {0}")]
    Invalid(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("unsupported policy path: {0}")]
    UnsupportedPath(String),
    #[error("invalid value for {path}: {reason}")]
    InvalidValue { path: String, reason: String },
}

impl From<PolicyError> for PilotError {
    fn from(value: PolicyError) -> Self {
        PilotError::new(value.to_string())
    }
}
