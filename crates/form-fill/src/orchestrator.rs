use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{info, instrument, warn};

use action_wait::{Condition, ConditionPoller, DriveOutcome, Present, RetryDriver};
use dom_port::{DomError, DomPort};
use slotpilot_core_types::{ElementRef, FieldName, RunId, SubmitLocator};
use tool_click::{ClickOutcome, InteractionEmitter, SkipReason};

use crate::errors::FillError;
use crate::policy::FormFillPolicy;
use crate::resolver::{FieldDescriptor, FieldResolver};

/// Desired option index per field, plus whether to submit afterwards.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FillRequest {
    pub indices: BTreeMap<FieldName, usize>,
    pub auto_submit: bool,
}

impl FillRequest {
    pub fn new(auto_submit: bool) -> Self {
        Self {
            indices: BTreeMap::new(),
            auto_submit,
        }
    }

    pub fn with(mut self, field: FieldName, index: usize) -> Self {
        self.indices.insert(field, index);
        self
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldOutcome {
    Selected { index: usize, evaluations: u32 },
    /// The option list never reached `index + 1` items.
    Exhausted { index: usize, evaluations: u32 },
    /// The trigger or the option could not be clicked.
    ControlUnavailable(SkipReason),
    Failed(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmitOutcome {
    NotRequested,
    /// The form never rendered, so nothing was filled or submitted.
    Halted,
    Clicked,
    NotFound,
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct FillReport {
    pub run_id: RunId,
    pub form_ready: bool,
    pub fields: BTreeMap<FieldName, FieldOutcome>,
    pub submit: SubmitOutcome,
    pub latency_ms: u128,
}

impl FillReport {
    pub fn selected(&self) -> usize {
        self.fields
            .values()
            .filter(|outcome| matches!(outcome, FieldOutcome::Selected { .. }))
            .count()
    }
}

/// The item at `index` of a populated option list.
struct OptionAt {
    items_selector: String,
    index: usize,
}

#[async_trait]
impl Condition for OptionAt {
    type Output = ElementRef;

    async fn evaluate(&self, port: &dyn DomPort) -> Result<Option<ElementRef>, DomError> {
        let Some(item) = port
            .query_all(&self.items_selector)
            .await?
            .into_iter()
            .nth(self.index)
        else {
            return Ok(None);
        };
        // Kendo renders the items before the popup is shown.
        let laid_out = port
            .inspect(&item)
            .await?
            .is_some_and(|state| state.laid_out);
        Ok(laid_out.then_some(item))
    }
}

/// Fills every resolved dropdown concurrently, then optionally submits.
///
/// Field tasks are joined on the caller's task; submission is only considered
/// once every one of them has settled.
pub struct FillOrchestrator<'a> {
    port: &'a dyn DomPort,
    emitter: &'a dyn InteractionEmitter,
    policy: &'a FormFillPolicy,
}

impl<'a> FillOrchestrator<'a> {
    pub fn new(
        port: &'a dyn DomPort,
        emitter: &'a dyn InteractionEmitter,
        policy: &'a FormFillPolicy,
    ) -> Self {
        Self {
            port,
            emitter,
            policy,
        }
    }

    #[instrument(skip_all, fields(run_id = %run_id))]
    pub async fn run(&self, run_id: RunId, request: &FillRequest) -> Result<FillReport, FillError> {
        let started = Instant::now();
        let mut report = FillReport {
            run_id,
            form_ready: false,
            fields: BTreeMap::new(),
            submit: SubmitOutcome::Halted,
            latency_ms: 0,
        };

        let ready = ConditionPoller::new(self.port, self.policy.form_ready.clone())
            .label("form-groups")
            .poll(&Present::new(self.policy.group_selector.clone()))
            .await;
        if !ready.is_ready() {
            warn!(
                selector = %self.policy.group_selector,
                evaluations = ready.evaluations(),
                "form groups never rendered"
            );
            report.latency_ms = started.elapsed().as_millis();
            return Ok(report);
        }
        report.form_ready = true;

        let fields = FieldResolver::new(self.port, self.policy).resolve().await?;
        let tasks: Vec<_> = fields
            .values()
            .filter_map(|descriptor| {
                request
                    .indices
                    .get(&descriptor.name)
                    .map(|index| self.fill_field(descriptor, *index))
            })
            .collect();
        info!(resolved = fields.len(), scheduled = tasks.len(), "filling form fields");

        for (name, outcome) in join_all(tasks).await {
            report.fields.insert(name, outcome);
        }

        report.submit = if request.auto_submit {
            self.submit().await
        } else {
            SubmitOutcome::NotRequested
        };
        report.latency_ms = started.elapsed().as_millis();
        info!(
            selected = report.selected(),
            fields = report.fields.len(),
            submit = ?report.submit,
            "form fill finished"
        );
        Ok(report)
    }

    #[instrument(skip_all, fields(field = %descriptor.name, index = index))]
    async fn fill_field(
        &self,
        descriptor: &FieldDescriptor,
        index: usize,
    ) -> (FieldName, FieldOutcome) {
        let name = descriptor.name;
        match self.emitter.click(self.port, &descriptor.control).await {
            Ok(report) => {
                if let ClickOutcome::Skipped(reason) = report.outcome {
                    warn!(?reason, "dropdown trigger not clickable");
                    return (name, FieldOutcome::ControlUnavailable(reason));
                }
            }
            Err(err) => {
                warn!(error = %err, "opening dropdown failed");
                return (name, FieldOutcome::Failed(err.to_string()));
            }
        }

        let condition = OptionAt {
            items_selector: format!(
                "{} {}",
                descriptor.option_list_selector, self.policy.option_item_selector
            ),
            index,
        };
        let port = self.port;
        let emitter = self.emitter;
        let outcome = RetryDriver::new(port, self.policy.option_poll.clone())
            .label(format!("options:{name}"))
            .drive(&condition, move |item| async move {
                emitter.click(port, &item).await
            })
            .await;

        let outcome = match outcome {
            DriveOutcome::Completed {
                result: Ok(report),
                evaluations,
            } => match report.outcome {
                ClickOutcome::Dispatched { .. } => FieldOutcome::Selected { index, evaluations },
                ClickOutcome::Skipped(reason) => FieldOutcome::ControlUnavailable(reason),
            },
            DriveOutcome::Completed {
                result: Err(err), ..
            } => {
                warn!(error = %err, "selecting option failed");
                FieldOutcome::Failed(err.to_string())
            }
            DriveOutcome::Exhausted { evaluations, .. } => {
                FieldOutcome::Exhausted { index, evaluations }
            }
        };
        (name, outcome)
    }

    async fn submit(&self) -> SubmitOutcome {
        let located = match &self.policy.submit {
            SubmitLocator::Id(id) => self.port.query_first(&format!("#{id}")).await,
            SubmitLocator::XPath(path) => self.port.query_xpath(path).await,
        };
        let button = match located {
            Ok(Some(button)) => button,
            Ok(None) => {
                warn!(locator = %self.policy.submit, "submit control not found");
                return SubmitOutcome::NotFound;
            }
            Err(err) => return SubmitOutcome::Failed(err.to_string()),
        };
        match self.emitter.click(self.port, &button).await {
            Ok(report) => match report.outcome {
                ClickOutcome::Dispatched { .. } => {
                    info!(locator = %self.policy.submit, "form submitted");
                    SubmitOutcome::Clicked
                }
                ClickOutcome::Skipped(reason) => SubmitOutcome::Skipped(reason),
            },
            Err(err) => SubmitOutcome::Failed(err.to_string()),
        }
    }
}
