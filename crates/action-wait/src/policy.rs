use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What wakes the poller between evaluations.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingPrimitive {
    #[default]
    Timer,
    AnimationFrame,
    MutationObserver,
}

/// Attempt ceiling and pacing for one wait.
///
/// Attempts are counted from 0. A policy with `max_attempts = Some(n)`
/// evaluates its condition at most `n + 1` times; `None` has no ceiling and
/// relies on `timeout_ms` (if any) or the condition eventually holding.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub interval_ms: u64,
    pub scheduling: SchedulingPrimitive,
    pub timeout_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::timer(10, 100)
    }
}

impl RetryPolicy {
    pub fn timer(max_attempts: u32, interval_ms: u64) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            interval_ms,
            scheduling: SchedulingPrimitive::Timer,
            timeout_ms: None,
        }
    }

    pub fn frames(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            interval_ms: 0,
            scheduling: SchedulingPrimitive::AnimationFrame,
            timeout_ms: None,
        }
    }

    /// Re-evaluates on every animation frame until the condition holds.
    pub fn frames_unbounded() -> Self {
        Self {
            max_attempts: None,
            ..Self::frames(0)
        }
    }

    /// Edge-triggered: re-evaluates on each mutation batch, no attempt ceiling.
    pub fn mutations() -> Self {
        Self {
            max_attempts: None,
            interval_ms: 0,
            scheduling: SchedulingPrimitive::MutationObserver,
            timeout_ms: None,
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn is_bounded(&self) -> bool {
        self.max_attempts.is_some() || self.timeout_ms.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_fields_default_individually() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_attempts": 3}"#).unwrap();
        assert_eq!(policy.max_attempts, Some(3));
        assert_eq!(policy.interval_ms, 100);
        assert_eq!(policy.scheduling, SchedulingPrimitive::Timer);
    }

    #[test]
    fn unbounded_frames_have_no_ceiling() {
        let policy = RetryPolicy::frames_unbounded();
        assert_eq!(policy.max_attempts, None);
        assert_eq!(policy.scheduling, SchedulingPrimitive::AnimationFrame);
        assert!(!policy.is_bounded());
        assert!(policy.with_timeout(5).is_bounded());
    }
}
