use thiserror::Error;

use slotpilot_core_types::{ElementRef, PilotError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("element {0} is no longer attached")]
    Detached(ElementRef),
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("{0} is not supported by this port")]
    Unsupported(&'static str),
}

impl DomError {
    pub fn invalid_selector(selector: &str, reason: impl Into<String>) -> Self {
        DomError::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<DomError> for PilotError {
    fn from(err: DomError) -> Self {
        PilotError::new(err.to_string())
    }
}
