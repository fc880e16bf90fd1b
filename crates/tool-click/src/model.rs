use std::time::Instant;

use dom_port::EventKind;
use slotpilot_core_types::{ElementRef, Point};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// Detached, or replaced by a re-render.
    Absent,
    /// `offsetParent === null`.
    NotLaidOut,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClickOutcome {
    Dispatched { at: Point },
    Skipped(SkipReason),
}

/// What one synthetic interaction actually did to the page.
#[derive(Clone, Debug)]
pub struct ClickReport {
    pub target: ElementRef,
    pub outcome: ClickOutcome,
    pub events: Vec<EventKind>,
    pub focused: bool,
    pub started_at: Instant,
    pub finished_at: Instant,
    pub latency_ms: u128,
}

impl ClickReport {
    pub fn new(target: ElementRef, started_at: Instant) -> Self {
        Self {
            target,
            outcome: ClickOutcome::Skipped(SkipReason::Absent),
            events: Vec::new(),
            focused: false,
            started_at,
            finished_at: started_at,
            latency_ms: 0,
        }
    }

    pub fn finish(mut self, finished_at: Instant) -> Self {
        self.finished_at = finished_at;
        self.latency_ms = finished_at
            .saturating_duration_since(self.started_at)
            .as_millis();
        self
    }

    pub fn is_dispatched(&self) -> bool {
        matches!(self.outcome, ClickOutcome::Dispatched { .. })
    }
}
