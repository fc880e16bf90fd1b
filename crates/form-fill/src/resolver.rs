use std::collections::BTreeMap;

use tracing::{debug, instrument};

use dom_port::{DomError, DomPort};
use slotpilot_core_types::{ElementRef, FieldName};

use crate::errors::ResolveError;
use crate::policy::{DuplicateLabelPolicy, FormFillPolicy};

/// One logical field, resolved fresh for each fill cycle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldDescriptor {
    pub name: FieldName,
    /// Dropdown trigger that opens the option list.
    pub control: ElementRef,
    /// Selector of the option list container, e.g. `#Category_listbox`.
    pub option_list_selector: String,
    pub label: String,
}

pub type FieldMap = BTreeMap<FieldName, FieldDescriptor>;

pub struct FieldResolver<'a> {
    port: &'a dyn DomPort,
    policy: &'a FormFillPolicy,
}

impl<'a> FieldResolver<'a> {
    pub fn new(port: &'a dyn DomPort, policy: &'a FormFillPolicy) -> Self {
        Self { port, policy }
    }

    /// Maps every visible, recognisable form group to its descriptor.
    ///
    /// Groups without label text, a recognised label, a trigger or a label
    /// `for` attribute are left out.
    #[instrument(skip_all)]
    pub async fn resolve(&self) -> Result<FieldMap, ResolveError> {
        let mut fields = FieldMap::new();
        for group in self.port.query_all(&self.policy.group_selector).await? {
            let descriptor = match self.describe(&group).await {
                Ok(Some(descriptor)) => descriptor,
                Ok(None) => continue,
                Err(err) => {
                    debug!(group = %group, error = %err, "form group unreadable, skipped");
                    continue;
                }
            };
            if let Some(previous) = fields.get(&descriptor.name) {
                match self.policy.duplicate_labels {
                    DuplicateLabelPolicy::Reject => {
                        return Err(ResolveError::DuplicateLabel(descriptor.name));
                    }
                    DuplicateLabelPolicy::LastSeenWins => {
                        debug!(
                            field = %descriptor.name,
                            replaced = %previous.control,
                            "duplicate label, keeping the later group"
                        );
                    }
                }
            }
            fields.insert(descriptor.name, descriptor);
        }
        debug!(
            fields = ?fields.keys().map(FieldName::key).collect::<Vec<_>>(),
            "form fields resolved"
        );
        Ok(fields)
    }

    async fn describe(&self, group: &ElementRef) -> Result<Option<FieldDescriptor>, DomError> {
        let Some(state) = self.port.inspect(group).await? else {
            return Ok(None);
        };
        if !state.laid_out {
            return Ok(None);
        }

        let Some(label) = self
            .port
            .query_within(group, &self.policy.label_selector)
            .await?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };
        let Some(label_state) = self.port.inspect(&label).await? else {
            return Ok(None);
        };
        let text = label_state.text.trim().to_string();
        if text.is_empty() {
            return Ok(None);
        }
        let Some(name) = self.policy.classify(&text) else {
            debug!(label = %text, "unrecognised form group");
            return Ok(None);
        };

        let Some(control) = self
            .port
            .query_within(group, &self.policy.trigger_selector)
            .await?
            .into_iter()
            .next()
        else {
            debug!(field = %name, "form group without dropdown trigger");
            return Ok(None);
        };
        let label_for = match label_state.attr("for") {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => {
                debug!(field = %name, "label without `for`, option list unknown");
                return Ok(None);
            }
        };

        Ok(Some(FieldDescriptor {
            name,
            control,
            option_list_selector: self.policy.option_list_selector(&label_for),
            label: text,
        }))
    }
}
