use serde::{Deserialize, Serialize};

use action_wait::RetryPolicy;
use slotpilot_core_types::{FieldName, SubmitLocator};

/// Label substring that classifies a form group.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub needle: String,
    pub field: FieldName,
}

impl VocabularyEntry {
    pub fn new(needle: &str, field: FieldName) -> Self {
        Self {
            needle: needle.to_string(),
            field,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateLabelPolicy {
    /// A later group replaces an earlier one for the same field.
    #[default]
    LastSeenWins,
    /// Two groups for one field fail the whole resolution.
    Reject,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormFillPolicy {
    pub group_selector: String,
    pub label_selector: String,
    pub trigger_selector: String,
    /// Appended to a label's `for` value to form the option list id.
    pub listbox_suffix: String,
    pub option_item_selector: String,
    /// Checked in order; the first needle contained in the label wins.
    pub vocabulary: Vec<VocabularyEntry>,
    pub duplicate_labels: DuplicateLabelPolicy,
    pub form_ready: RetryPolicy,
    pub option_poll: RetryPolicy,
    pub submit: SubmitLocator,
}

impl Default for FormFillPolicy {
    fn default() -> Self {
        Self {
            group_selector: "form .mb-3".into(),
            label_selector: "label".into(),
            trigger_selector: "span.k-select".into(),
            listbox_suffix: "_listbox".into(),
            option_item_selector: ".k-item".into(),
            vocabulary: vec![
                VocabularyEntry::new("Category", FieldName::Category),
                VocabularyEntry::new("Location", FieldName::Location),
                VocabularyEntry::new("Visa Type", FieldName::VisaType),
                VocabularyEntry::new("Visa Sub Type", FieldName::VisaSubType),
                VocabularyEntry::new("Mission", FieldName::Mission),
            ],
            duplicate_labels: DuplicateLabelPolicy::LastSeenWins,
            form_ready: RetryPolicy::timer(50, 100),
            option_poll: RetryPolicy::timer(200, 10),
            submit: SubmitLocator::XPath(
                "/html/body/main/div/div[2]/div[1]/div[2]/form/div[2]/div[31]/button".into(),
            ),
        }
    }
}

impl FormFillPolicy {
    /// Case-sensitive substring classification of a label.
    pub fn classify(&self, label: &str) -> Option<FieldName> {
        self.vocabulary
            .iter()
            .find(|entry| label.contains(&entry.needle))
            .map(|entry| entry.field)
    }

    pub fn option_list_selector(&self, label_for: &str) -> String {
        format!("#{label_for}{}", self.listbox_suffix)
    }
}
