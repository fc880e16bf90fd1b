//! Calendar booking state machine.
//!
//! Every state runs one step against the page and returns the next state.
//! Waiting is done through [`ConditionPoller`], [`RetryDriver`] and
//! [`OverlayGate`]; no state blocks without a bound except `CalendarOpening`,
//! whose default policy has no ceiling.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

use action_wait::{Condition, DriveOutcome, OverlayGate, RetryDriver, VisibleMatch};
use dom_port::{collect_matching, first_visible, DomError, DomPort, EventKind};
use slotpilot_core_types::{ElementRef, RunId, SubmitLocator};
use tool_click::{ClickReport, InteractionEmitter};

use crate::errors::FlowError;
use crate::policy::SequencerPolicy;
use crate::random::RandomSource;
use crate::state::{HaltReason, RunReport, SelectedDateSet, WorkflowState};

/// Clickable ancestor of the first visible calendar icon.
struct CalendarToggle {
    icon_selector: String,
    button_selector: String,
}

#[async_trait]
impl Condition for CalendarToggle {
    type Output = ElementRef;

    async fn evaluate(&self, port: &dyn DomPort) -> Result<Option<ElementRef>, DomError> {
        match first_visible(port, &self.icon_selector).await? {
            Some((icon, _)) => port.closest(&icon, &self.button_selector).await,
            None => Ok(None),
        }
    }
}

/// Laid-out dropdown wrapper still showing its placeholder text.
struct PlaceholderDropdown {
    wrap_selector: String,
    text_selector: String,
    placeholder: String,
}

impl PlaceholderDropdown {
    fn from_policy(policy: &SequencerPolicy) -> Self {
        Self {
            wrap_selector: policy.dropdown_wrap_selector.clone(),
            text_selector: policy.dropdown_text_selector.clone(),
            placeholder: policy.dropdown_placeholder.clone(),
        }
    }
}

#[async_trait]
impl Condition for PlaceholderDropdown {
    type Output = ElementRef;

    async fn evaluate(&self, port: &dyn DomPort) -> Result<Option<ElementRef>, DomError> {
        for wrap in port.query_all(&self.wrap_selector).await? {
            let Some(state) = port.inspect(&wrap).await? else {
                continue;
            };
            if !state.laid_out {
                continue;
            }
            let Some(text) = port
                .query_within(&wrap, &self.text_selector)
                .await?
                .into_iter()
                .next()
            else {
                continue;
            };
            if let Some(text_state) = port.inspect(&text).await? {
                if text_state.text.contains(&self.placeholder) {
                    return Ok(Some(wrap));
                }
            }
        }
        Ok(None)
    }
}

/// Submit control, located by id or absolute path, once laid out.
struct SubmitReady {
    locator: SubmitLocator,
}

#[async_trait]
impl Condition for SubmitReady {
    type Output = ElementRef;

    async fn evaluate(&self, port: &dyn DomPort) -> Result<Option<ElementRef>, DomError> {
        let located = match &self.locator {
            SubmitLocator::Id(id) => port.query_first(&format!("#{id}")).await?,
            SubmitLocator::XPath(path) => port.query_xpath(path).await?,
        };
        let Some(button) = located else {
            return Ok(None);
        };
        Ok(match port.inspect(&button).await? {
            Some(state) if state.laid_out => Some(button),
            _ => None,
        })
    }
}

async fn click_trigger(
    port: &dyn DomPort,
    emitter: &dyn InteractionEmitter,
    wrap: &ElementRef,
    trigger_selector: &str,
) -> Result<Option<ClickReport>, FlowError> {
    let Some(trigger) = port
        .query_within(wrap, trigger_selector)
        .await?
        .into_iter()
        .next()
    else {
        debug!(wrap = %wrap, "dropdown wrapper without trigger");
        return Ok(None);
    };
    Ok(Some(emitter.click(port, &trigger).await?))
}

async fn settle(ms: u64) {
    if ms > 0 {
        sleep(Duration::from_millis(ms)).await;
    }
}

#[derive(Default)]
struct RunScratch {
    dates: SelectedDateSet,
    slot: Option<String>,
}

/// Drives one calendar booking pass from `Idle` to `Done` or `Halted`.
pub struct BookingSequencer<'a> {
    port: &'a dyn DomPort,
    emitter: &'a dyn InteractionEmitter,
    policy: &'a SequencerPolicy,
    rng: Box<dyn RandomSource + 'a>,
}

impl<'a> BookingSequencer<'a> {
    pub fn new(
        port: &'a dyn DomPort,
        emitter: &'a dyn InteractionEmitter,
        policy: &'a SequencerPolicy,
        rng: Box<dyn RandomSource + 'a>,
    ) -> Self {
        Self {
            port,
            emitter,
            policy,
            rng,
        }
    }

    /// Runs a fresh pass. Each call starts with an empty [`SelectedDateSet`].
    #[instrument(skip_all, fields(run_id = %run_id))]
    pub async fn run(&mut self, run_id: RunId) -> RunReport {
        let started_at = Utc::now();
        let started = Instant::now();
        let mut scratch = RunScratch::default();
        let mut trail = Vec::new();

        let mut state = WorkflowState::Idle;
        loop {
            info!(state = %state, "entering state");
            trail.push(state.clone());
            if state.is_terminal() {
                break;
            }
            state = self.step(&state, &mut scratch).await;
        }

        let report = RunReport {
            run_id,
            trail,
            selected_dates: scratch.dates,
            slot: scratch.slot,
            outcome: state,
            started_at,
            elapsed_ms: started.elapsed().as_millis(),
        };
        match report.halt_reason() {
            Some(reason) => warn!(
                %reason,
                trail = ?report.trail_names(),
                elapsed_ms = report.elapsed_ms as u64,
                "booking run halted"
            ),
            None => info!(
                slot = report.slot.as_deref().unwrap_or(""),
                elapsed_ms = report.elapsed_ms as u64,
                "booking run done"
            ),
        }
        report
    }

    async fn step(&mut self, state: &WorkflowState, scratch: &mut RunScratch) -> WorkflowState {
        let next = match state {
            WorkflowState::Idle => Ok(WorkflowState::CalendarOpening),
            WorkflowState::CalendarOpening => self.open_calendar().await,
            WorkflowState::DateSelecting { months_advanced } => {
                self.select_date(*months_advanced, &mut scratch.dates).await
            }
            WorkflowState::MonthAdvancing { months_advanced } => {
                self.advance_month(*months_advanced).await
            }
            WorkflowState::OverlayWaiting => Ok(self.wait_for_overlay().await),
            WorkflowState::TimeDropdownOpening => self.open_time_dropdown().await,
            WorkflowState::SlotSelecting { attempt } => {
                self.select_slot(*attempt, &mut scratch.slot).await
            }
            WorkflowState::Submitting => self.submit().await,
            WorkflowState::Done | WorkflowState::Halted { .. } => Ok(state.clone()),
        };
        next.unwrap_or_else(|err| {
            warn!(state = %state, error = %err, "step failed");
            WorkflowState::halted(HaltReason::InteractionFailed)
        })
    }

    async fn open_calendar(&self) -> Result<WorkflowState, FlowError> {
        let condition = CalendarToggle {
            icon_selector: self.policy.calendar_icon_selector.clone(),
            button_selector: self.policy.calendar_button_selector.clone(),
        };
        let (port, emitter) = (self.port, self.emitter);
        let outcome = RetryDriver::new(port, self.policy.calendar_poll.clone())
            .label("calendar")
            .drive(&condition, move |button| async move {
                emitter.click(port, &button).await
            })
            .await;
        let DriveOutcome::Completed { result, evaluations } = outcome else {
            return Ok(WorkflowState::halted(HaltReason::CalendarUnavailable));
        };
        let report = result?;
        info!(evaluations, dispatched = report.is_dispatched(), "calendar opened");
        settle(self.policy.settle.before_date_scan_ms).await;
        Ok(WorkflowState::DateSelecting { months_advanced: 0 })
    }

    /// Laid-out, enabled date links not picked earlier in this run.
    async fn eligible_dates(
        &self,
        picked: &SelectedDateSet,
    ) -> Result<Vec<(ElementRef, String)>, FlowError> {
        let mut out = Vec::new();
        for link in self.port.query_all(&self.policy.date_link_selector).await? {
            let Some(state) = self.port.inspect(&link).await? else {
                continue;
            };
            if !state.laid_out {
                continue;
            }
            let Some(value) = state.attr(&self.policy.date_value_attr) else {
                continue;
            };
            if picked.contains(value) {
                continue;
            }
            let value = value.to_string();
            if let Some(cell) = self
                .port
                .closest(&link, &self.policy.date_cell_selector)
                .await?
            {
                let disabled = self
                    .port
                    .inspect(&cell)
                    .await?
                    .map(|cell| cell.has_class(&self.policy.disabled_cell_class))
                    .unwrap_or(false);
                if disabled {
                    continue;
                }
            }
            out.push((link, value));
        }
        Ok(out)
    }

    async fn select_date(
        &mut self,
        months_advanced: u32,
        picked: &mut SelectedDateSet,
    ) -> Result<WorkflowState, FlowError> {
        let candidates = self.eligible_dates(picked).await?;
        if candidates.is_empty() {
            debug!(months_advanced, "no eligible date in view");
            return Ok(WorkflowState::MonthAdvancing { months_advanced });
        }
        let index = self.rng.pick(candidates.len()).min(candidates.len() - 1);
        let (link, value) = &candidates[index];
        picked.insert(value.clone());
        let report = self
            .emitter
            .click_and_notify(self.port, link, &[EventKind::Input, EventKind::Change])
            .await?;
        info!(
            date = %value,
            candidates = candidates.len(),
            dispatched = report.is_dispatched(),
            "date selected"
        );
        Ok(WorkflowState::OverlayWaiting)
    }

    async fn advance_month(&self, months_advanced: u32) -> Result<WorkflowState, FlowError> {
        if months_advanced >= self.policy.max_month_advances {
            warn!(
                months_advanced,
                limit = self.policy.max_month_advances,
                "month advance limit reached"
            );
            return Ok(WorkflowState::halted(HaltReason::NoEligibleDate));
        }
        let (port, emitter) = (self.port, self.emitter);
        let outcome = RetryDriver::new(port, self.policy.next_month_poll.clone())
            .label("next-month")
            .drive(
                &VisibleMatch::new(self.policy.next_month_selector.clone()),
                move |(button, _)| async move { emitter.click(port, &button).await },
            )
            .await;
        let DriveOutcome::Completed { result, .. } = outcome else {
            warn!(months_advanced, "no next month control");
            return Ok(WorkflowState::halted(HaltReason::NoEligibleDate));
        };
        result?;
        info!(months_advanced = months_advanced + 1, "advanced to next month");
        settle(self.policy.settle.before_date_scan_ms).await;
        Ok(WorkflowState::DateSelecting {
            months_advanced: months_advanced + 1,
        })
    }

    async fn wait_for_overlay(&self) -> WorkflowState {
        let delay = self.policy.settle.after_overlay_ms;
        let (outcome, ()) = OverlayGate::new(self.port)
            .loader_selector(self.policy.loader_selector.clone())
            .wait_then(self.policy.overlay_max_attempts, |_| settle(delay))
            .await;
        debug!(
            clear = outcome.is_clear(),
            evaluations = outcome.evaluations(),
            "overlay gate passed"
        );
        WorkflowState::TimeDropdownOpening
    }

    async fn open_time_dropdown(&self) -> Result<WorkflowState, FlowError> {
        let condition = PlaceholderDropdown::from_policy(self.policy);
        let (port, emitter) = (self.port, self.emitter);
        let trigger_selector = self.policy.dropdown_trigger_selector.as_str();
        let outcome = RetryDriver::new(port, self.policy.time_dropdown_poll.clone())
            .label("time-dropdown")
            .drive(&condition, move |wrap| async move {
                click_trigger(port, emitter, &wrap, trigger_selector).await
            })
            .await;
        let DriveOutcome::Completed { result, evaluations } = outcome else {
            return Ok(WorkflowState::halted(HaltReason::TimeDropdownUnavailable));
        };
        let opened = result?.map(|report| report.is_dispatched()).unwrap_or(false);
        info!(evaluations, opened, "time dropdown opened");
        settle(self.policy.settle.after_dropdown_ms).await;
        Ok(WorkflowState::SlotSelecting { attempt: 0 })
    }

    /// One placeholder lookup and trigger click, without waiting.
    async fn reopen_time_dropdown(&self) -> Result<(), FlowError> {
        let condition = PlaceholderDropdown::from_policy(self.policy);
        if let Some(wrap) = condition.evaluate(self.port).await? {
            click_trigger(
                self.port,
                self.emitter,
                &wrap,
                &self.policy.dropdown_trigger_selector,
            )
            .await?;
        }
        Ok(())
    }

    async fn select_slot(
        &mut self,
        attempt: u32,
        slot: &mut Option<String>,
    ) -> Result<WorkflowState, FlowError> {
        let slots = collect_matching(self.port, &self.policy.slot_selector, |state| state.laid_out)
            .await?;
        if !slots.is_empty() {
            let index = self.rng.pick(slots.len()).min(slots.len() - 1);
            let (element, state) = &slots[index];
            let label = state.text.trim().to_string();
            let report = self
                .emitter
                .click_and_notify(self.port, element, &[EventKind::Change])
                .await?;
            info!(
                slot = %label,
                candidates = slots.len(),
                attempt,
                dispatched = report.is_dispatched(),
                "time slot picked"
            );
            *slot = Some(label);
            settle(self.policy.settle.after_slot_ms).await;
            return Ok(WorkflowState::Submitting);
        }

        let retries_left = self
            .policy
            .slot_poll
            .max_attempts
            .map_or(true, |max| attempt < max);
        if !retries_left {
            warn!(attempt, "no available slot after retries");
            return Ok(WorkflowState::halted(HaltReason::NoAvailableSlot));
        }
        debug!(attempt, "no slot yet, re-opening time dropdown");
        sleep(self.policy.slot_poll.interval()).await;
        self.reopen_time_dropdown().await?;
        Ok(WorkflowState::SlotSelecting {
            attempt: attempt + 1,
        })
    }

    async fn submit(&self) -> Result<WorkflowState, FlowError> {
        let condition = SubmitReady {
            locator: self.policy.submit.clone(),
        };
        let (port, emitter) = (self.port, self.emitter);
        let outcome = RetryDriver::new(port, self.policy.submit_poll.clone())
            .label("submit")
            .drive(&condition, move |button| async move {
                emitter.click(port, &button).await
            })
            .await;
        let DriveOutcome::Completed { result, evaluations } = outcome else {
            return Ok(WorkflowState::halted(HaltReason::SubmitUnavailable));
        };
        let report = result?;
        if !report.is_dispatched() {
            warn!(outcome = ?report.outcome, "submit control vanished before the click");
            return Ok(WorkflowState::halted(HaltReason::SubmitUnavailable));
        }
        info!(locator = %self.policy.submit, evaluations, "booking submitted");
        Ok(WorkflowState::Done)
    }
}
