use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Shared error type every slotpilot crate converts into.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PilotError {
    #[error("{message}")]
    Message { message: String },
}

impl PilotError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Identifier of one agent run (one sequencer pass or one form fill).
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle to a live element, only meaningful to the port that issued it.
///
/// Handles are never cached across steps; a handle to a re-rendered element
/// inspects as absent.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ElementRef(pub String);

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Viewport-relative bounding box, as `getBoundingClientRect` reports it.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }
}

/// Logical form fields the resolver knows how to classify.
#[cfg_attr(
    feature = "serde-full",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum FieldName {
    Category,
    Location,
    VisaType,
    VisaSubType,
    Mission,
}

impl FieldName {
    pub const ALL: [FieldName; 5] = [
        FieldName::Category,
        FieldName::Location,
        FieldName::VisaType,
        FieldName::VisaSubType,
        FieldName::Mission,
    ];

    /// Key under which the field appears in fill maps and persisted settings.
    pub fn key(&self) -> &'static str {
        match self {
            FieldName::Category => "category",
            FieldName::Location => "location",
            FieldName::VisaType => "visaType",
            FieldName::VisaSubType => "visaSubType",
            FieldName::Mission => "mission",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Fixed locator for the final submit control.
#[cfg_attr(
    feature = "serde-full",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmitLocator {
    Id(String),
    #[cfg_attr(feature = "serde-full", serde(rename = "xpath"))]
    XPath(String),
}

impl fmt::Display for SubmitLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitLocator::Id(id) => write!(f, "#{id}"),
            SubmitLocator::XPath(path) => write!(f, "xpath:{path}"),
        }
    }
}
