use thiserror::Error;

use dom_port::DomError;
use slotpilot_core_types::{FieldName, PilotError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("more than one visible form group resolves to `{0}`")]
    DuplicateLabel(FieldName),
    #[error("form scan failed: {0}")]
    Dom(#[from] DomError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FillError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl From<ResolveError> for PilotError {
    fn from(err: ResolveError) -> Self {
        PilotError::new(err.to_string())
    }
}

impl From<FillError> for PilotError {
    fn from(err: FillError) -> Self {
        PilotError::new(err.to_string())
    }
}
