//! Helpers for the pages in front of the booking form: the consent modal,
//! the "new appointment" navigation and the login link.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use action_wait::{Condition, DriveOutcome, Present, RetryDriver};
use dom_port::{DomError, DomPort};
use slotpilot_core_types::ElementRef;
use slotpilot_settings::{Clock, LoginGate, SettingsStore};
use tool_click::{redact, ClickError, ClickReport, InteractionEmitter};

use crate::errors::FlowError;
use crate::policy::LandingPolicy;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Clicked,
    NotFound,
    /// Found, but not laid out or gone by the time of the click.
    Skipped,
    /// The login cooldown has not elapsed yet.
    CoolingDown,
    Failed(String),
}

impl StepOutcome {
    fn from_click(result: Result<ClickReport, ClickError>) -> Self {
        match result {
            Ok(report) if report.is_dispatched() => StepOutcome::Clicked,
            Ok(_) => StepOutcome::Skipped,
            Err(err) => StepOutcome::Failed(err.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavTarget {
    NewAppointmentLink,
    BookNewAppointment,
    TryAgain,
}

#[derive(Clone, Debug, Serialize)]
pub struct LandingReport {
    pub consent: StepOutcome,
    pub navigation: Vec<(NavTarget, StepOutcome)>,
    pub login: StepOutcome,
}

/// First match of a selector, once laid out and not disabled.
struct EnabledControl {
    selector: String,
}

#[async_trait]
impl Condition for EnabledControl {
    type Output = ElementRef;

    async fn evaluate(&self, port: &dyn DomPort) -> Result<Option<ElementRef>, DomError> {
        let Some(control) = port.query_first(&self.selector).await? else {
            return Ok(None);
        };
        Ok(match port.inspect(&control).await? {
            Some(state) if state.laid_out && !state.disabled => Some(control),
            _ => None,
        })
    }
}

pub struct LandingAgent<'a> {
    port: &'a dyn DomPort,
    emitter: &'a dyn InteractionEmitter,
    policy: &'a LandingPolicy,
    store: &'a dyn SettingsStore,
    clock: &'a dyn Clock,
}

impl<'a> LandingAgent<'a> {
    pub fn new(
        port: &'a dyn DomPort,
        emitter: &'a dyn InteractionEmitter,
        policy: &'a LandingPolicy,
        store: &'a dyn SettingsStore,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            port,
            emitter,
            policy,
            store,
            clock,
        }
    }

    /// Consent polling runs alongside navigation and login.
    #[instrument(skip_all)]
    pub async fn run(&self) -> LandingReport {
        let (consent, (navigation, login)) = tokio::join!(self.accept_consent(), async {
            let navigation = self.navigate().await;
            let login = self.login().await;
            (navigation, login)
        });
        info!(?consent, ?navigation, ?login, "landing pass finished");
        LandingReport {
            consent,
            navigation,
            login,
        }
    }

    pub async fn accept_consent(&self) -> StepOutcome {
        let condition = EnabledControl {
            selector: self.policy.consent_selector.clone(),
        };
        let (port, emitter) = (self.port, self.emitter);
        let outcome = RetryDriver::new(port, self.policy.consent_poll.clone())
            .label("consent")
            .drive(&condition, move |button| async move {
                emitter.click(port, &button).await
            })
            .await;
        match outcome {
            DriveOutcome::Completed { result, .. } => StepOutcome::from_click(result),
            DriveOutcome::Exhausted { .. } => StepOutcome::NotFound,
        }
    }

    pub async fn navigate(&self) -> Vec<(NavTarget, StepOutcome)> {
        match self.try_navigate().await {
            Ok(clicked) => clicked,
            Err(err) => {
                warn!(error = %err, "navigation step failed");
                Vec::new()
            }
        }
    }

    async fn try_navigate(&self) -> Result<Vec<(NavTarget, StepOutcome)>, FlowError> {
        let url = self.port.current_url().await?;
        let mut clicked = Vec::new();
        if self.policy.is_account_page(&url) {
            let link = self.port.query_first(&self.policy.nav_link_selector).await?;
            clicked.push((NavTarget::NewAppointmentLink, self.click_found(link).await));
        } else if self.policy.is_pending_page(&url) {
            let button = self.find_by_text(&self.policy.book_new_text).await?;
            clicked.push((NavTarget::BookNewAppointment, self.click_found(button).await));
        }
        if let Some(retry) = self.find_by_text(&self.policy.try_again_text).await? {
            clicked.push((NavTarget::TryAgain, self.click_found(Some(retry)).await));
        }
        debug!(url = %redact::url(&url), targets = clicked.len(), "navigation checked");
        Ok(clicked)
    }

    /// Appointment button whose trimmed text equals `text`.
    async fn find_by_text(&self, text: &str) -> Result<Option<ElementRef>, FlowError> {
        for button in self
            .port
            .query_all(&self.policy.appointment_button_selector)
            .await?
        {
            if let Some(state) = self.port.inspect(&button).await? {
                if state.text.trim() == text {
                    return Ok(Some(button));
                }
            }
        }
        Ok(None)
    }

    async fn click_found(&self, target: Option<ElementRef>) -> StepOutcome {
        match target {
            Some(target) => StepOutcome::from_click(self.emitter.click(self.port, &target).await),
            None => StepOutcome::NotFound,
        }
    }

    /// Clicks the login link unless the last click is inside the cooldown.
    /// The timestamp is recorded only when the click went through.
    pub async fn login(&self) -> StepOutcome {
        let gate = LoginGate::new(self.store).with_cooldown(self.policy.login_cooldown_ms);
        let now = self.clock.now_ms();
        match gate.permits(now).await {
            Ok(true) => {}
            Ok(false) => return StepOutcome::CoolingDown,
            Err(err) => {
                warn!(error = %err, "login cooldown unreadable");
                return StepOutcome::Failed(err.to_string());
            }
        }

        let (port, emitter) = (self.port, self.emitter);
        let outcome = RetryDriver::new(port, self.policy.login_poll.clone())
            .label("login")
            .drive(
                &Present::new(self.policy.login_selector.clone()),
                move |link| async move { emitter.click(port, &link).await },
            )
            .await;
        let step = match outcome {
            DriveOutcome::Completed { result, .. } => StepOutcome::from_click(result),
            DriveOutcome::Exhausted { .. } => StepOutcome::NotFound,
        };
        if step == StepOutcome::Clicked {
            if let Err(err) = gate.record(now).await {
                warn!(error = %err, "login click not recorded");
            }
        }
        step
    }
}
