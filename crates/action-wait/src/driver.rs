use std::future::Future;

use tracing::{info, warn};

use dom_port::DomPort;

use crate::condition::Condition;
use crate::poller::{ConditionPoller, ExhaustReason, PollOutcome};
use crate::policy::RetryPolicy;

#[derive(Clone, Debug, PartialEq)]
pub enum DriveOutcome<R> {
    Completed { result: R, evaluations: u32 },
    Exhausted { evaluations: u32, reason: ExhaustReason },
}

impl<R> DriveOutcome<R> {
    pub fn is_completed(&self) -> bool {
        matches!(self, DriveOutcome::Completed { .. })
    }

    pub fn evaluations(&self) -> u32 {
        match self {
            DriveOutcome::Completed { evaluations, .. }
            | DriveOutcome::Exhausted { evaluations, .. } => *evaluations,
        }
    }

    pub fn into_result(self) -> Option<R> {
        match self {
            DriveOutcome::Completed { result, .. } => Some(result),
            DriveOutcome::Exhausted { .. } => None,
        }
    }
}

type ExhaustHook<'h> = Box<dyn FnOnce(ExhaustReason, u32) + Send + 'h>;

/// Runs an action once a condition holds, or an exhaustion hook once the
/// policy runs out. Never returns an error to its caller.
///
/// `drive` consumes the driver, so attempt counts cannot leak between steps.
pub struct RetryDriver<'a> {
    poller: ConditionPoller<'a>,
    on_exhausted: Option<ExhaustHook<'a>>,
}

impl<'a> RetryDriver<'a> {
    pub fn new(port: &'a dyn DomPort, policy: RetryPolicy) -> Self {
        Self {
            poller: ConditionPoller::new(port, policy),
            on_exhausted: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.poller = self.poller.label(label);
        self
    }

    pub fn observe_root(mut self, selector: impl Into<String>) -> Self {
        self.poller = self.poller.observe_root(selector);
        self
    }

    pub fn on_exhausted<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(ExhaustReason, u32) + Send + 'a,
    {
        self.on_exhausted = Some(Box::new(hook));
        self
    }

    pub async fn drive<C, F, Fut, R>(self, condition: &C, action: F) -> DriveOutcome<R>
    where
        C: Condition + ?Sized,
        F: FnOnce(C::Output) -> Fut + Send,
        Fut: Future<Output = R> + Send,
    {
        match self.poller.poll(condition).await {
            PollOutcome::Ready { value, evaluations } => {
                info!(label = %self.poller.name(), evaluations, "retry driver condition met");
                DriveOutcome::Completed {
                    result: action(value).await,
                    evaluations,
                }
            }
            PollOutcome::Exhausted {
                evaluations,
                reason,
            } => {
                warn!(
                    label = %self.poller.name(),
                    evaluations,
                    max_attempts = ?self.poller.policy().max_attempts,
                    %reason,
                    "retry driver gave up"
                );
                if let Some(hook) = self.on_exhausted {
                    hook(reason, evaluations);
                }
                DriveOutcome::Exhausted {
                    evaluations,
                    reason,
                }
            }
        }
    }
}
