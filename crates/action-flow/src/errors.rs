//! Flow execution error types

use thiserror::Error;

use dom_port::DomError;
use slotpilot_core_types::PilotError;
use slotpilot_settings::SettingsError;
use tool_click::ClickError;

/// Errors raised inside a single workflow step.
///
/// They never leave the sequencer: a step that fails ends the run as
/// `Halted(interaction_failed)`.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Page access failed
    #[error("dom error: {0}")]
    Dom(#[from] DomError),

    /// Synthetic interaction failed
    #[error("interaction error: {0}")]
    Click(#[from] ClickError),

    /// Persisted settings could not be read or written
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
}

impl From<FlowError> for PilotError {
    fn from(err: FlowError) -> Self {
        PilotError::new(err.to_string())
    }
}
