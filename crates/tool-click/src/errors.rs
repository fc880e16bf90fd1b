use thiserror::Error;

use dom_port::DomError;
use slotpilot_core_types::PilotError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClickError {
    #[error("synthetic interactions disabled by policy")]
    Disabled,
    #[error("dispatch failed: {0}")]
    Dom(#[from] DomError),
}

impl From<ClickError> for PilotError {
    fn from(err: ClickError) -> Self {
        PilotError::new(err.to_string())
    }
}
