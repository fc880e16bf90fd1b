use std::fmt;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use dom_port::DomPort;

use crate::condition::Condition;
use crate::policy::{RetryPolicy, SchedulingPrimitive};
use crate::tick::{FrameTicks, MutationTicks, TickSource, TimerTicks};

/// Interval used when an observer cannot be installed and the poller falls
/// back to timer ticks.
pub const OBSERVER_FALLBACK_INTERVAL_MS: u64 = 100;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExhaustReason {
    AttemptsExhausted,
    TimedOut,
    SourceClosed,
}

impl fmt::Display for ExhaustReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExhaustReason::AttemptsExhausted => "attempts exhausted",
            ExhaustReason::TimedOut => "timed out",
            ExhaustReason::SourceClosed => "tick source closed",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome<T> {
    Ready { value: T, evaluations: u32 },
    Exhausted { evaluations: u32, reason: ExhaustReason },
}

impl<T> PollOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, PollOutcome::Ready { .. })
    }

    pub fn evaluations(&self) -> u32 {
        match self {
            PollOutcome::Ready { evaluations, .. } | PollOutcome::Exhausted { evaluations, .. } => {
                *evaluations
            }
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            PollOutcome::Ready { value, .. } => Some(value),
            PollOutcome::Exhausted { .. } => None,
        }
    }
}

/// Re-evaluates a [`Condition`] under a [`RetryPolicy`].
///
/// The first evaluation runs immediately; each later one follows exactly one
/// tick of the policy's scheduling primitive.
pub struct ConditionPoller<'a> {
    port: &'a dyn DomPort,
    policy: RetryPolicy,
    observe_root: String,
    label: String,
}

impl<'a> ConditionPoller<'a> {
    pub fn new(port: &'a dyn DomPort, policy: RetryPolicy) -> Self {
        Self {
            port,
            policy,
            observe_root: "body".into(),
            label: "condition".into(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Subtree observed in mutation mode.
    pub fn observe_root(mut self, selector: impl Into<String>) -> Self {
        self.observe_root = selector.into();
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn port(&self) -> &'a dyn DomPort {
        self.port
    }

    pub fn name(&self) -> &str {
        &self.label
    }

    async fn tick_source(&self) -> Box<dyn TickSource + 'a> {
        match self.policy.scheduling {
            SchedulingPrimitive::Timer => Box::new(TimerTicks::new(self.policy.interval())),
            SchedulingPrimitive::AnimationFrame => Box::new(FrameTicks::new(self.port)),
            SchedulingPrimitive::MutationObserver => {
                match self.port.observe(&self.observe_root).await {
                    Ok(stream) => Box::new(MutationTicks::new(stream)),
                    Err(err) => {
                        let interval = self.policy.interval_ms.max(OBSERVER_FALLBACK_INTERVAL_MS);
                        warn!(
                            label = %self.label,
                            root = %self.observe_root,
                            error = %err,
                            interval_ms = interval,
                            "mutation observer unavailable, polling on a timer"
                        );
                        Box::new(TimerTicks::new(std::time::Duration::from_millis(interval)))
                    }
                }
            }
        }
    }

    async fn evaluate<C>(&self, condition: &C, attempt: u32) -> Option<C::Output>
    where
        C: Condition + ?Sized,
    {
        match condition.evaluate(self.port).await {
            Ok(value) => {
                trace!(label = %self.label, attempt, ready = value.is_some(), "evaluated");
                value
            }
            Err(err) => {
                debug!(label = %self.label, attempt, error = %err, "evaluation failed, not ready");
                None
            }
        }
    }

    pub async fn poll<C>(&self, condition: &C) -> PollOutcome<C::Output>
    where
        C: Condition + ?Sized,
    {
        let deadline = self.policy.timeout().map(|timeout| Instant::now() + timeout);
        // Observers attach before the first evaluation so no change in between is lost.
        let mut ticks = self.tick_source().await;

        let mut evaluations: u32 = 0;
        loop {
            if let Some(value) = self.evaluate(condition, evaluations).await {
                evaluations += 1;
                debug!(label = %self.label, evaluations, "condition ready");
                return PollOutcome::Ready { value, evaluations };
            }
            evaluations += 1;

            if let Some(max) = self.policy.max_attempts {
                if evaluations > max {
                    return self.exhausted(evaluations, ExhaustReason::AttemptsExhausted);
                }
            }

            let ticked = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, ticks.tick()).await {
                    Ok(ticked) => ticked,
                    Err(_) => return self.exhausted(evaluations, ExhaustReason::TimedOut),
                },
                None => ticks.tick().await,
            };
            if !ticked {
                return self.exhausted(evaluations, ExhaustReason::SourceClosed);
            }
        }
    }

    fn exhausted<T>(&self, evaluations: u32, reason: ExhaustReason) -> PollOutcome<T> {
        debug!(label = %self.label, evaluations, %reason, "condition exhausted");
        PollOutcome::Exhausted {
            evaluations,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use dom_port::memory::{ElementSpec, MemoryDom};
    use dom_port::DomError;
    use futures::FutureExt;

    use super::*;
    use crate::condition::{condition_fn, Present};

    struct Counting {
        calls: AtomicU32,
        ready_at: Option<u32>,
    }

    impl Counting {
        fn new(ready_at: Option<u32>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                ready_at,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Condition for Counting {
        type Output = u32;

        async fn evaluate(&self, _port: &dyn DomPort) -> Result<Option<u32>, DomError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(match self.ready_at {
                Some(at) if n >= at => Some(n),
                _ => None,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn never_true_condition_is_evaluated_max_plus_one_times() {
        let dom = MemoryDom::new();
        for n in [0u32, 1, 5, 20] {
            let condition = Counting::new(None);
            let outcome = ConditionPoller::new(&*dom, RetryPolicy::timer(n, 10))
                .poll(&condition)
                .await;
            assert_eq!(
                outcome,
                PollOutcome::Exhausted {
                    evaluations: n + 1,
                    reason: ExhaustReason::AttemptsExhausted
                }
            );
            assert_eq!(condition.calls(), n + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn already_true_condition_schedules_nothing() {
        let dom = MemoryDom::new();
        let started = Instant::now();
        let outcome = ConditionPoller::new(&*dom, RetryPolicy::timer(5, 1_000))
            .poll(&Counting::new(Some(1)))
            .await;
        assert_eq!(outcome.evaluations(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);

        let outcome = ConditionPoller::new(&*dom, RetryPolicy::frames(5))
            .poll(&Counting::new(Some(1)))
            .await;
        assert!(outcome.is_ready());
        assert_eq!(dom.frames(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn third_evaluation_success_uses_three_evaluations() {
        let dom = MemoryDom::new();
        let started = Instant::now();
        let condition = Counting::new(Some(3));
        let outcome = ConditionPoller::new(&*dom, RetryPolicy::timer(3, 10))
            .poll(&condition)
            .await;
        assert_eq!(
            outcome,
            PollOutcome::Ready {
                value: 3,
                evaluations: 3
            }
        );
        assert_eq!(condition.calls(), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn frame_policy_ticks_once_per_frame() {
        let dom = MemoryDom::new();
        let outcome = ConditionPoller::new(&*dom, RetryPolicy::frames(4))
            .poll(&Counting::new(None))
            .await;
        assert_eq!(outcome.evaluations(), 5);
        assert_eq!(dom.frames(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn evaluation_errors_count_as_not_ready() {
        let dom = MemoryDom::new();
        let outcome = ConditionPoller::new(&*dom, RetryPolicy::timer(2, 10))
            .poll(&Present::new("a:hover"))
            .await;
        assert_eq!(
            outcome,
            PollOutcome::Exhausted {
                evaluations: 3,
                reason: ExhaustReason::AttemptsExhausted
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_bounds_unbounded_policy() {
        let dom = MemoryDom::new();
        let policy = RetryPolicy {
            max_attempts: None,
            interval_ms: 30,
            ..RetryPolicy::default()
        }
        .with_timeout(100);
        let outcome = ConditionPoller::new(&*dom, policy)
            .poll(&Present::new(".never"))
            .await;
        assert_eq!(
            outcome,
            PollOutcome::Exhausted {
                evaluations: 4,
                reason: ExhaustReason::TimedOut
            }
        );
    }

    #[tokio::test]
    async fn mutation_mode_resolves_on_batch_and_disconnects() {
        let dom = MemoryDom::new();
        let form = dom.mutate(|tree| {
            let body = tree.body();
            tree.append(body, ElementSpec::new("form"))
        });

        let writer = dom.clone();
        let handle = tokio::spawn(async move {
            while writer.observer_count() == 0 {
                tokio::task::yield_now().await;
            }
            writer.mutate(|tree| tree.set_text(form, "noise"));
            tokio::task::yield_now().await;
            writer.mutate(|tree| {
                tree.append(form, ElementSpec::new("div").class("mb-3"));
            });
        });

        let outcome = ConditionPoller::new(&*dom, RetryPolicy::mutations())
            .observe_root("form")
            .poll(&Present::new("form .mb-3"))
            .await;
        handle.await.unwrap();
        assert!(outcome.is_ready());
        assert!(outcome.evaluations() >= 2);
        assert_eq!(dom.observer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn mutation_mode_falls_back_to_timer() {
        let dom = MemoryDom::new();
        dom.disable_observers();
        let policy = RetryPolicy {
            max_attempts: Some(2),
            ..RetryPolicy::mutations()
        };
        let started = Instant::now();
        let outcome = ConditionPoller::new(&*dom, policy)
            .poll(&Present::new(".never"))
            .await;
        assert_eq!(outcome.evaluations(), 3);
        assert_eq!(
            started.elapsed(),
            Duration::from_millis(2 * OBSERVER_FALLBACK_INTERVAL_MS)
        );
    }

    #[tokio::test]
    async fn closure_conditions_read_the_page() {
        let dom = MemoryDom::new();
        dom.set_url("https://example.test/Global/Appointment/VisaType");
        let condition = condition_fn(|port| {
            async move {
                let url = port.current_url().await?;
                Ok(url.contains("VisaType").then_some(url.len()))
            }
            .boxed()
        });
        let outcome = ConditionPoller::new(&*dom, RetryPolicy::timer(0, 10))
            .poll(&condition)
            .await;
        assert!(outcome.is_ready());
    }
}
