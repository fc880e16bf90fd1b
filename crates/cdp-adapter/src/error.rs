use std::fmt;

use chromiumoxide::error::CdpError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dom_port::DomError;
use slotpilot_core_types::{ElementRef, PilotError};

use crate::script::DETACHED_MARKER;

#[derive(Clone, Copy, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum AdapterErrorKind {
    #[error("browser launch failed")]
    Launch,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("no usable page")]
    PageNotFound,
    #[error("script raised")]
    Script,
    #[error("unexpected script result")]
    Decode,
}

/// Failure inside the adapter, with an optional hint for logs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for AdapterError {}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        Self { kind, hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<CdpError> for AdapterError {
    fn from(err: CdpError) -> Self {
        match err {
            CdpError::JavascriptException(details) => {
                let message = details
                    .exception
                    .as_ref()
                    .and_then(|exception| exception.description.clone())
                    .unwrap_or_else(|| details.text.clone());
                AdapterError::new(AdapterErrorKind::Script).with_hint(message)
            }
            other => AdapterError::new(AdapterErrorKind::CdpIo).with_hint(other.to_string()),
        }
    }
}

impl From<AdapterError> for PilotError {
    fn from(err: AdapterError) -> Self {
        PilotError::new(err.to_string())
    }
}

/// Maps a failed page call onto the port's error vocabulary.
pub(crate) fn to_dom_error(err: AdapterError, selector: Option<&str>) -> DomError {
    let hint = err.hint.clone().unwrap_or_default();
    match err.kind {
        AdapterErrorKind::Script => {
            if let Some(id) = detached_id(&hint) {
                return DomError::Detached(ElementRef(id.to_string()));
            }
            match selector {
                Some(selector) if hint.contains("SyntaxError") => {
                    DomError::invalid_selector(selector, hint)
                }
                _ => DomError::Script(hint),
            }
        }
        AdapterErrorKind::Decode => DomError::Script(err.to_string()),
        _ => DomError::Transport(err.to_string()),
    }
}

fn detached_id(message: &str) -> Option<&str> {
    let (_, rest) = message.split_once(DETACHED_MARKER)?;
    rest.split(|c: char| c.is_whitespace() || c == '\n')
        .next()
        .filter(|id| !id.is_empty())
}
