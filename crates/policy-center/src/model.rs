use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use action_flow::{LandingPolicy, SequencerPolicy};
use form_fill::FormFillPolicy;
use tool_click::ClickPolicyView;

use crate::errors::PolicyError;

/// Every tunable the agents read, plus where each leaf value came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub rev: u64,
    #[serde(default)]
    pub click: ClickPolicyView,
    #[serde(default)]
    pub form: FormFillPolicy,
    #[serde(default)]
    pub sequencer: SequencerPolicy,
    #[serde(default)]
    pub landing: LandingPolicy,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provenance: BTreeMap<String, PolicyProvenance>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyProvenance {
    pub path: String,
    pub source: PolicySource,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicySource {
    Builtin,
    File,
    Env,
    Cli,
}

/// Paths whose value is replaced whole rather than walked into.
pub(crate) const OPAQUE_PATHS: &[&str] = &["form.submit", "sequencer.submit"];

impl PolicySnapshot {
    pub fn set_provenance(&mut self, path: &str, source: PolicySource) {
        self.provenance.insert(
            path.to_string(),
            PolicyProvenance {
                path: path.to_string(),
                source,
            },
        );
    }

    pub fn source_of(&self, path: &str) -> Option<PolicySource> {
        self.provenance.get(path).map(|entry| entry.source)
    }

    /// Replaces the value at a dotted path such as `sequencer.slot_poll.max_attempts`.
    ///
    /// The path must already exist in the serialized snapshot; the result must
    /// still deserialize into the section type.
    pub fn apply_override(
        &mut self,
        path: &str,
        value: &Value,
        source: PolicySource,
    ) -> Result<(), PolicyError> {
        let Some((section, rest)) = path.split_once('.') else {
            return Err(PolicyError::UnsupportedPath(path.to_string()));
        };
        match section {
            "click" => overlay_section(&mut self.click, path, rest, value)?,
            "form" => overlay_section(&mut self.form, path, rest, value)?,
            "sequencer" => overlay_section(&mut self.sequencer, path, rest, value)?,
            "landing" => overlay_section(&mut self.landing, path, rest, value)?,
            _ => return Err(PolicyError::UnsupportedPath(path.to_string())),
        }
        self.set_provenance(path, source);
        Ok(())
    }
}

fn overlay_section<T>(
    section: &mut T,
    path: &str,
    rest: &str,
    value: &Value,
) -> Result<(), PolicyError>
where
    T: Serialize + DeserializeOwned,
{
    let mut tree =
        serde_json::to_value(&*section).map_err(|err| PolicyError::Invalid(err.to_string()))?;
    let slot = rest
        .split('.')
        .try_fold(&mut tree, |node, segment| node.get_mut(segment))
        .ok_or_else(|| PolicyError::UnsupportedPath(path.to_string()))?;
    *slot = value.clone();
    *section = serde_json::from_value(tree).map_err(|err| PolicyError::InvalidValue {
        path: path.to_string(),
        reason: err.to_string(),
    })?;
    Ok(())
}
