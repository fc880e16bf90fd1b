//! Workflow states and the per-run record kept by the sequencer.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use slotpilot_core_types::RunId;

/// Why a run stopped short of `Done`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    CalendarUnavailable,
    NoEligibleDate,
    TimeDropdownUnavailable,
    NoAvailableSlot,
    SubmitUnavailable,
    InteractionFailed,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HaltReason::CalendarUnavailable => "calendar_unavailable",
            HaltReason::NoEligibleDate => "no_eligible_date",
            HaltReason::TimeDropdownUnavailable => "time_dropdown_unavailable",
            HaltReason::NoAvailableSlot => "no_available_slot",
            HaltReason::SubmitUnavailable => "submit_unavailable",
            HaltReason::InteractionFailed => "interaction_failed",
        })
    }
}

/// Booking workflow state. Attempt counters travel inside the states.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    CalendarOpening,
    DateSelecting { months_advanced: u32 },
    MonthAdvancing { months_advanced: u32 },
    OverlayWaiting,
    TimeDropdownOpening,
    SlotSelecting { attempt: u32 },
    Submitting,
    Done,
    Halted { reason: HaltReason },
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Done | WorkflowState::Halted { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::CalendarOpening => "calendar_opening",
            WorkflowState::DateSelecting { .. } => "date_selecting",
            WorkflowState::MonthAdvancing { .. } => "month_advancing",
            WorkflowState::OverlayWaiting => "overlay_waiting",
            WorkflowState::TimeDropdownOpening => "time_dropdown_opening",
            WorkflowState::SlotSelecting { .. } => "slot_selecting",
            WorkflowState::Submitting => "submitting",
            WorkflowState::Done => "done",
            WorkflowState::Halted { .. } => "halted",
        }
    }

    pub fn halted(reason: HaltReason) -> Self {
        WorkflowState::Halted { reason }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::DateSelecting { months_advanced }
            | WorkflowState::MonthAdvancing { months_advanced } => {
                write!(f, "{}(months_advanced={months_advanced})", self.name())
            }
            WorkflowState::SlotSelecting { attempt } => {
                write!(f, "{}(attempt={attempt})", self.name())
            }
            WorkflowState::Halted { reason } => write!(f, "halted({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Date values already picked in this run. Append-only.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct SelectedDateSet {
    order: Vec<String>,
    #[serde(skip)]
    seen: BTreeSet<String>,
}

impl SelectedDateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when `value` was already recorded.
    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        if !self.seen.insert(value.clone()) {
            return false;
        }
        self.order.push(value);
        true
    }

    pub fn contains(&self, value: &str) -> bool {
        self.seen.contains(value)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Values in pick order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

/// What one sequencer run did.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub trail: Vec<WorkflowState>,
    pub selected_dates: SelectedDateSet,
    pub slot: Option<String>,
    pub outcome: WorkflowState,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u128,
}

impl RunReport {
    pub fn is_done(&self) -> bool {
        self.outcome == WorkflowState::Done
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        match self.outcome {
            WorkflowState::Halted { reason } => Some(reason),
            _ => None,
        }
    }

    /// State names in visiting order, e.g. for log lines.
    pub fn trail_names(&self) -> Vec<&'static str> {
        self.trail.iter().map(WorkflowState::name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selected_dates_reject_repeats() {
        let mut set = SelectedDateSet::new();
        assert!(set.insert("2026/10/21"));
        assert!(set.insert("2026/10/23"));
        assert!(!set.insert("2026/10/21"));
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["2026/10/21", "2026/10/23"]);
    }

    #[test]
    fn states_render_with_counters() {
        assert_eq!(
            WorkflowState::SlotSelecting { attempt: 3 }.to_string(),
            "slot_selecting(attempt=3)"
        );
        assert_eq!(
            WorkflowState::halted(HaltReason::NoEligibleDate).to_string(),
            "halted(no_eligible_date)"
        );
        assert!(WorkflowState::Done.is_terminal());
        assert!(!WorkflowState::OverlayWaiting.is_terminal());
    }

    #[test]
    fn halted_state_serializes_reason() {
        let json =
            serde_json::to_value(WorkflowState::halted(HaltReason::NoAvailableSlot)).unwrap();
        assert_eq!(json["state"], "halted");
        assert_eq!(json["reason"], "no_available_slot");
    }
}
