use async_trait::async_trait;

use dom_port::{DomPort, EventKind};
use slotpilot_core_types::ElementRef;

use crate::errors::ClickError;
use crate::model::ClickReport;
use crate::policy::ClickPolicyView;
use crate::runner::{execute, RuntimeDeps};

/// Dispatches human-looking interactions at a live element.
///
/// The full `mousedown`, `mouseup`, `click` sequence is sent because the target
/// widgets ignore a bare `click`. Absent or unlaid-out targets are a no-op,
/// reported as skipped.
#[async_trait]
pub trait InteractionEmitter: Send + Sync {
    async fn click(&self, port: &dyn DomPort, target: &ElementRef)
        -> Result<ClickReport, ClickError>;

    /// Click, then dispatch bubbling notifications such as `input`/`change`.
    async fn click_and_notify(
        &self,
        port: &dyn DomPort,
        target: &ElementRef,
        notify: &[EventKind],
    ) -> Result<ClickReport, ClickError>;
}

#[derive(Clone, Debug, Default)]
pub struct SyntheticEmitter {
    policy: ClickPolicyView,
}

impl SyntheticEmitter {
    pub fn new(policy: ClickPolicyView) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ClickPolicyView {
        &self.policy
    }
}

#[async_trait]
impl InteractionEmitter for SyntheticEmitter {
    async fn click(
        &self,
        port: &dyn DomPort,
        target: &ElementRef,
    ) -> Result<ClickReport, ClickError> {
        self.click_and_notify(port, target, &[]).await
    }

    async fn click_and_notify(
        &self,
        port: &dyn DomPort,
        target: &ElementRef,
        notify: &[EventKind],
    ) -> Result<ClickReport, ClickError> {
        let deps = RuntimeDeps {
            port,
            policy: &self.policy,
        };
        execute(target, notify, deps).await
    }
}
