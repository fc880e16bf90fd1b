use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickPolicyView {
    pub enabled: bool,
    /// Move input focus to the target after the pointer sequence.
    pub focus_after_click: bool,
    /// Skip targets without an `offsetParent`.
    pub require_layout: bool,
}

impl Default for ClickPolicyView {
    fn default() -> Self {
        Self {
            enabled: true,
            focus_after_click: true,
            require_layout: true,
        }
    }
}
