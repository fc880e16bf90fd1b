use dom_port::{DomPort, ElementState};
use slotpilot_core_types::ElementRef;
use tracing::debug;

use crate::errors::ClickError;
use crate::model::SkipReason;
use crate::policy::ClickPolicyView;

pub(crate) enum Precheck {
    Ready(ElementState),
    Skip(SkipReason),
}

pub(crate) async fn run_precheck(
    port: &dyn DomPort,
    target: &ElementRef,
    policy: &ClickPolicyView,
) -> Result<Precheck, ClickError> {
    let Some(state) = port.inspect(target).await? else {
        debug!(target = %target, "click target absent");
        return Ok(Precheck::Skip(SkipReason::Absent));
    };
    if policy.require_layout && !state.laid_out {
        debug!(target = %target, "click target not laid out");
        return Ok(Precheck::Skip(SkipReason::NotLaidOut));
    }
    Ok(Precheck::Ready(state))
}
