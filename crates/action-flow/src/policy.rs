use serde::{Deserialize, Serialize};

use action_wait::{RetryPolicy, DEFAULT_LOADER_SELECTOR};
use slotpilot_core_types::SubmitLocator;

/// Pauses between a state's exit action and the next state's first look.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleDelays {
    pub before_date_scan_ms: u64,
    pub after_overlay_ms: u64,
    pub after_dropdown_ms: u64,
    pub after_slot_ms: u64,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            before_date_scan_ms: 20,
            after_overlay_ms: 10,
            after_dropdown_ms: 10,
            after_slot_ms: 50,
        }
    }
}

/// Selectors and retry budgets of the date/time booking workflow.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerPolicy {
    pub calendar_icon_selector: String,
    /// Clickable ancestor of the calendar icon.
    pub calendar_button_selector: String,
    /// No ceiling by default; the icon is expected to render eventually.
    pub calendar_poll: RetryPolicy,
    pub date_link_selector: String,
    pub date_value_attr: String,
    pub date_cell_selector: String,
    pub disabled_cell_class: String,
    pub next_month_selector: String,
    pub next_month_poll: RetryPolicy,
    pub max_month_advances: u32,
    pub loader_selector: String,
    pub overlay_max_attempts: u32,
    pub dropdown_wrap_selector: String,
    pub dropdown_text_selector: String,
    pub dropdown_trigger_selector: String,
    pub dropdown_placeholder: String,
    pub time_dropdown_poll: RetryPolicy,
    pub slot_selector: String,
    /// `max_attempts` bounds the re-scans, `interval_ms` spaces them.
    pub slot_poll: RetryPolicy,
    pub submit: SubmitLocator,
    pub submit_poll: RetryPolicy,
    pub settle: SettleDelays,
}

impl Default for SequencerPolicy {
    fn default() -> Self {
        Self {
            calendar_icon_selector: "span.k-icon.k-i-calendar".into(),
            calendar_button_selector: r#"span[role="button"]"#.into(),
            calendar_poll: RetryPolicy::frames_unbounded(),
            date_link_selector: "a.k-link[data-value]".into(),
            date_value_attr: "data-value".into(),
            date_cell_selector: "td".into(),
            disabled_cell_class: "k-state-disabled".into(),
            next_month_selector: ".k-nav-next".into(),
            next_month_poll: RetryPolicy::frames(10),
            max_month_advances: 12,
            loader_selector: DEFAULT_LOADER_SELECTOR.into(),
            overlay_max_attempts: 50,
            dropdown_wrap_selector: "span.k-dropdown-wrap".into(),
            dropdown_text_selector: ".k-input".into(),
            dropdown_trigger_selector: ".k-select".into(),
            dropdown_placeholder: "--Select--".into(),
            time_dropdown_poll: RetryPolicy::timer(10, 10),
            slot_selector: ".slot-item.bg-success".into(),
            slot_poll: RetryPolicy::timer(10, 40),
            submit: SubmitLocator::Id("btnSubmit".into()),
            submit_poll: RetryPolicy::timer(40, 50),
            settle: SettleDelays::default(),
        }
    }
}

/// Selectors for the pages before the booking form.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandingPolicy {
    pub consent_selector: String,
    pub consent_poll: RetryPolicy,
    /// Case-insensitive URL fragments of the account pages.
    pub account_url_patterns: Vec<String>,
    pub pending_url_pattern: String,
    pub nav_link_selector: String,
    pub appointment_button_selector: String,
    pub book_new_text: String,
    pub try_again_text: String,
    pub login_selector: String,
    pub login_poll: RetryPolicy,
    pub login_cooldown_ms: u64,
}

impl Default for LandingPolicy {
    fn default() -> Self {
        Self {
            consent_selector: r#"button.btn.btn-primary[data-bs-dismiss="modal"]"#.into(),
            consent_poll: RetryPolicy::timer(20, 500),
            account_url_patterns: vec!["changepassword".into(), "home/index".into()],
            pending_url_pattern: "PendingAppointment".into(),
            nav_link_selector:
                r#"a.nav-link.new-app-active[href="/Global/appointment/newappointment"]"#.into(),
            appointment_button_selector:
                r#"a.btn.btn-primary[href="/Global/appointment/newappointment"]"#.into(),
            book_new_text: "Book New Appointment".into(),
            try_again_text: "Try Again".into(),
            login_selector: "span.text-secondary.bg-light.rounded-3.p-2.fw-bold.login-link".into(),
            login_poll: RetryPolicy::timer(20, 100),
            login_cooldown_ms: slotpilot_settings::LOGIN_COOLDOWN_MS,
        }
    }
}

impl LandingPolicy {
    pub fn is_account_page(&self, url: &str) -> bool {
        let url = url.to_ascii_lowercase();
        self.account_url_patterns
            .iter()
            .any(|pattern| url.contains(&pattern.to_ascii_lowercase()))
    }

    pub fn is_pending_page(&self, url: &str) -> bool {
        url.to_ascii_lowercase()
            .contains(&self.pending_url_pattern.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_classification_ignores_case() {
        let policy = LandingPolicy::default();
        assert!(policy.is_account_page("https://x.test/Global/account/ChangePassword?alert=True"));
        assert!(policy.is_account_page("https://x.test/Global/Home/Index"));
        assert!(!policy.is_account_page("https://x.test/Global/Appointment/VisaType"));
        assert!(policy.is_pending_page("https://x.test/Global/Appointment/PendingAppointment"));
    }

    #[test]
    fn calendar_wait_has_no_ceiling() {
        let policy = SequencerPolicy::default();
        assert!(!policy.calendar_poll.is_bounded());
        assert!(policy.slot_poll.is_bounded());
        assert_eq!(policy.max_month_advances, 12);
    }
}
