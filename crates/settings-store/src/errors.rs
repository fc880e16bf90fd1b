use thiserror::Error;

use slotpilot_core_types::PilotError;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file {path} is not valid: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown setting `{0}`")]
    UnknownKey(String),
    #[error("invalid value for `{key}`: {value}")]
    InvalidValue { key: String, value: String },
}

impl From<SettingsError> for PilotError {
    fn from(err: SettingsError) -> Self {
        PilotError::new(err.to_string())
    }
}
