use std::time::Instant;

use dom_port::{DomError, DomPort, EventKind, SyntheticEvent};
use slotpilot_core_types::ElementRef;
use tracing::{debug, info, instrument, warn};

use crate::errors::ClickError;
use crate::model::{ClickOutcome, ClickReport, SkipReason};
use crate::policy::ClickPolicyView;
use crate::precheck::{self, Precheck};

const POINTER_SEQUENCE: [EventKind; 3] =
    [EventKind::MouseDown, EventKind::MouseUp, EventKind::Click];

pub struct RuntimeDeps<'a> {
    pub port: &'a dyn DomPort,
    pub policy: &'a ClickPolicyView,
}

#[instrument(skip_all, fields(target = %target))]
pub async fn execute(
    target: &ElementRef,
    notify: &[EventKind],
    deps: RuntimeDeps<'_>,
) -> Result<ClickReport, ClickError> {
    if !deps.policy.enabled {
        return Err(ClickError::Disabled);
    }
    let mut report = ClickReport::new(target.clone(), Instant::now());

    let state = match precheck::run_precheck(deps.port, target, deps.policy).await? {
        Precheck::Ready(state) => state,
        Precheck::Skip(reason) => {
            report.outcome = ClickOutcome::Skipped(reason);
            return Ok(report.finish(Instant::now()));
        }
    };

    let at = state.rect.center();
    for kind in POINTER_SEQUENCE {
        match deps
            .port
            .dispatch(target, &SyntheticEvent::pointer(kind, at))
            .await
        {
            Ok(()) => report.events.push(kind),
            Err(DomError::Detached(_)) if report.events.is_empty() => {
                debug!("target re-rendered before the first pointer event");
                report.outcome = ClickOutcome::Skipped(SkipReason::Absent);
                return Ok(report.finish(Instant::now()));
            }
            Err(DomError::Detached(_)) => {
                debug!(event = %kind, "target detached mid-sequence");
                report.outcome = ClickOutcome::Dispatched { at };
                return Ok(report.finish(Instant::now()));
            }
            Err(err) => return Err(err.into()),
        }
    }
    report.outcome = ClickOutcome::Dispatched { at };

    if deps.policy.focus_after_click {
        match deps.port.focus(target).await {
            Ok(()) => report.focused = true,
            Err(DomError::Detached(_)) => debug!("target detached before focus"),
            Err(err) => warn!(error = %err, "focus after click failed"),
        }
    }

    for kind in notify {
        match deps
            .port
            .dispatch(target, &SyntheticEvent::notify(*kind))
            .await
        {
            Ok(()) => report.events.push(*kind),
            Err(DomError::Detached(_)) => {
                debug!(event = %kind, "target detached before notification");
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }

    info!(x = at.x, y = at.y, events = report.events.len(), "synthetic click dispatched");
    Ok(report.finish(Instant::now()))
}
