use std::future::Future;

use async_trait::async_trait;
use tracing::{debug, warn};

use dom_port::{DomError, DomPort};

use crate::condition::Condition;
use crate::poller::{ConditionPoller, PollOutcome};
use crate::policy::{RetryPolicy, SchedulingPrimitive};

pub const DEFAULT_LOADER_SELECTOR: &str = ".global-overlay-loader";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GateOutcome {
    Clear { evaluations: u32 },
    /// The loader never went away; the caller proceeds anyway.
    FailedOpen { evaluations: u32 },
}

impl GateOutcome {
    pub fn is_clear(&self) -> bool {
        matches!(self, GateOutcome::Clear { .. })
    }

    pub fn evaluations(&self) -> u32 {
        match self {
            GateOutcome::Clear { evaluations } | GateOutcome::FailedOpen { evaluations } => {
                *evaluations
            }
        }
    }
}

/// Holds while the first loader match is absent, detached or not visible.
#[derive(Clone, Debug)]
pub struct LoaderCleared {
    pub selector: String,
}

#[async_trait]
impl Condition for LoaderCleared {
    type Output = ();

    async fn evaluate(&self, port: &dyn DomPort) -> Result<Option<()>, DomError> {
        let Some(loader) = port.query_first(&self.selector).await? else {
            return Ok(Some(()));
        };
        Ok(match port.inspect(&loader).await? {
            Some(state) if state.is_visible() => None,
            _ => Some(()),
        })
    }
}

/// Blocks until the global busy overlay is gone, failing open on exhaustion.
pub struct OverlayGate<'a> {
    port: &'a dyn DomPort,
    loader_selector: String,
    scheduling: SchedulingPrimitive,
    interval_ms: u64,
}

impl<'a> OverlayGate<'a> {
    pub fn new(port: &'a dyn DomPort) -> Self {
        Self {
            port,
            loader_selector: DEFAULT_LOADER_SELECTOR.into(),
            scheduling: SchedulingPrimitive::AnimationFrame,
            interval_ms: 0,
        }
    }

    pub fn loader_selector(mut self, selector: impl Into<String>) -> Self {
        self.loader_selector = selector.into();
        self
    }

    pub fn scheduling(mut self, scheduling: SchedulingPrimitive, interval_ms: u64) -> Self {
        self.scheduling = scheduling;
        self.interval_ms = interval_ms;
        self
    }

    pub async fn wait_until_clear(&self, max_attempts: u32) -> GateOutcome {
        let policy = RetryPolicy {
            max_attempts: Some(max_attempts),
            interval_ms: self.interval_ms,
            scheduling: self.scheduling,
            timeout_ms: None,
        };
        let condition = LoaderCleared {
            selector: self.loader_selector.clone(),
        };
        let outcome = ConditionPoller::new(self.port, policy)
            .label("overlay")
            .poll(&condition)
            .await;
        match outcome {
            PollOutcome::Ready { evaluations, .. } => {
                debug!(evaluations, "overlay clear");
                GateOutcome::Clear { evaluations }
            }
            PollOutcome::Exhausted {
                evaluations,
                reason,
            } => {
                warn!(
                    selector = %self.loader_selector,
                    evaluations,
                    %reason,
                    "overlay still present, proceeding anyway"
                );
                GateOutcome::FailedOpen { evaluations }
            }
        }
    }

    /// Runs `continuation` after the gate resolves, whichever way it resolved.
    pub async fn wait_then<F, Fut>(
        &self,
        max_attempts: u32,
        continuation: F,
    ) -> (GateOutcome, Fut::Output)
    where
        F: FnOnce(GateOutcome) -> Fut + Send,
        Fut: Future + Send,
    {
        let outcome = self.wait_until_clear(max_attempts).await;
        let out = continuation(outcome).await;
        (outcome, out)
    }
}
