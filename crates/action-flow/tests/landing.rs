use std::sync::{Arc, Weak};
use std::time::Duration;

use action_flow::{LandingAgent, LandingPolicy, NavTarget, StepOutcome};
use dom_port::memory::{ElementSpec, MemoryDom, NodeId};
use dom_port::EventKind;
use slotpilot_settings::{Clock, SettingsCenter, SettingsStore};
use tool_click::SyntheticEmitter;

struct FixedClock(u64);

impl Clock for FixedClock {
    fn now_ms(&self) -> u64 {
        self.0
    }
}

const NOW: u64 = 1_760_000_000_000;
const NEW_APPOINTMENT: &str = "/Global/appointment/newappointment";

struct Landing {
    dom: Arc<MemoryDom>,
    consent: NodeId,
    login: NodeId,
}

fn landing_page(url: &str, buttons: &[&str], consent_disabled: bool) -> Landing {
    let dom = MemoryDom::new();
    dom.set_url(url);
    let (consent, login) = dom.mutate(|tree| {
        let body = tree.body();
        let modal = tree.append(body, ElementSpec::new("div").class("modal"));
        let mut consent = ElementSpec::new("button")
            .class("btn btn-primary")
            .attr("data-bs-dismiss", "modal")
            .text("I agree to provide my consent");
        if consent_disabled {
            consent = consent.attr("disabled", "");
        }
        let consent = tree.append(modal, consent);

        let nav = tree.append(body, ElementSpec::new("nav"));
        tree.append(
            nav,
            ElementSpec::new("a")
                .class("nav-link new-app-active")
                .attr("href", NEW_APPOINTMENT)
                .text("Book New Appointment"),
        );
        for label in buttons {
            tree.append(
                body,
                ElementSpec::new("a")
                    .class("btn btn-primary")
                    .attr("href", NEW_APPOINTMENT)
                    .text(&format!("  {label} ")),
            );
        }
        let login = tree.append(
            body,
            ElementSpec::new("span")
                .class("text-secondary bg-light rounded-3 p-2 fw-bold login-link")
                .text("Login"),
        );
        (consent, login)
    });
    Landing { dom, consent, login }
}

fn button_with_text(dom: &MemoryDom, text: &str) -> NodeId {
    dom.read(|tree| {
        tree.select("a.btn")
            .unwrap()
            .into_iter()
            .find(|node| tree.text_content(*node).trim() == text)
            .expect("button present")
    })
}

#[tokio::test(start_paused = true)]
async fn account_page_follows_nav_link_and_logs_in() {
    let page = landing_page(
        "https://appointment.example.test/Global/account/ChangePassword?alert=True",
        &[],
        false,
    );
    let policy = LandingPolicy::default();
    let store = SettingsCenter::in_memory();
    let clock = FixedClock(NOW);
    let emitter = SyntheticEmitter::default();

    let report = LandingAgent::new(&*page.dom, &emitter, &policy, &store, &clock)
        .run()
        .await;

    assert_eq!(report.consent, StepOutcome::Clicked);
    assert_eq!(
        report.navigation,
        vec![(NavTarget::NewAppointmentLink, StepOutcome::Clicked)]
    );
    assert_eq!(report.login, StepOutcome::Clicked);
    assert_eq!(page.dom.events_on(page.consent, EventKind::Click), 1);
    assert_eq!(page.dom.events_on(page.login, EventKind::Click), 1);
    let nav = page.dom.read(|tree| tree.first("a.nav-link")).unwrap();
    assert_eq!(page.dom.events_on(nav, EventKind::Click), 1);
    assert_eq!(
        store.snapshot().await.unwrap().last_login_click_ms,
        Some(NOW)
    );
}

#[tokio::test(start_paused = true)]
async fn pending_page_picks_buttons_by_exact_text() {
    let page = landing_page(
        "https://appointment.example.test/Global/Appointment/PendingAppointment",
        &["Cancel Appointment", "Book New Appointment", "Try Again"],
        false,
    );
    let policy = LandingPolicy::default();
    let emitter = SyntheticEmitter::default();
    let store = SettingsCenter::in_memory();
    let clock = FixedClock(NOW);

    let navigation = LandingAgent::new(&*page.dom, &emitter, &policy, &store, &clock)
        .navigate()
        .await;
    assert_eq!(
        navigation,
        vec![
            (NavTarget::BookNewAppointment, StepOutcome::Clicked),
            (NavTarget::TryAgain, StepOutcome::Clicked),
        ]
    );
    let cancel = button_with_text(&page.dom, "Cancel Appointment");
    assert_eq!(page.dom.events_on(cancel, EventKind::Click), 0);
    let nav = page.dom.read(|tree| tree.first("a.nav-link")).unwrap();
    assert_eq!(page.dom.events_on(nav, EventKind::Click), 0);
}

#[tokio::test(start_paused = true)]
async fn other_pages_only_look_for_try_again() {
    let page = landing_page(
        "https://appointment.example.test/Global/Appointment/NewAppointment",
        &[],
        false,
    );
    let policy = LandingPolicy::default();
    let emitter = SyntheticEmitter::default();
    let store = SettingsCenter::in_memory();
    let clock = FixedClock(NOW);
    let navigation = LandingAgent::new(&*page.dom, &emitter, &policy, &store, &clock)
        .navigate()
        .await;
    assert!(navigation.is_empty());
}

#[tokio::test(start_paused = true)]
async fn login_inside_cooldown_is_not_clicked() {
    let page = landing_page("https://appointment.example.test/Global/home/index", &[], false);
    let policy = LandingPolicy::default();
    let emitter = SyntheticEmitter::default();
    let store = SettingsCenter::in_memory();
    store.record_login_click(NOW - 10_000).await.unwrap();

    let clock = FixedClock(NOW);
    let outcome = LandingAgent::new(&*page.dom, &emitter, &policy, &store, &clock)
        .login()
        .await;
    assert_eq!(outcome, StepOutcome::CoolingDown);
    assert_eq!(page.dom.events_on(page.login, EventKind::Click), 0);
    assert_eq!(
        store.snapshot().await.unwrap().last_login_click_ms,
        Some(NOW - 10_000)
    );

    let later = FixedClock(NOW + 20_000);
    let outcome = LandingAgent::new(&*page.dom, &emitter, &policy, &store, &later)
        .login()
        .await;
    assert_eq!(outcome, StepOutcome::Clicked);
    assert_eq!(
        store.snapshot().await.unwrap().last_login_click_ms,
        Some(NOW + 20_000)
    );
}

#[tokio::test(start_paused = true)]
async fn missing_login_link_records_nothing() {
    let page = landing_page("https://appointment.example.test/Global/home/index", &[], false);
    page.dom.mutate(|tree| tree.remove(page.login));
    let policy = LandingPolicy::default();
    let emitter = SyntheticEmitter::default();
    let store = SettingsCenter::in_memory();
    let clock = FixedClock(NOW);

    let started = tokio::time::Instant::now();
    let outcome = LandingAgent::new(&*page.dom, &emitter, &policy, &store, &clock)
        .login()
        .await;
    assert_eq!(outcome, StepOutcome::NotFound);
    assert_eq!(started.elapsed(), Duration::from_millis(20 * 100));
    assert_eq!(store.snapshot().await.unwrap().last_login_click_ms, None);
}

#[tokio::test(start_paused = true)]
async fn consent_waits_until_enabled() {
    let page = landing_page("https://appointment.example.test/Global/home/index", &[], true);
    let weak: Weak<MemoryDom> = Arc::downgrade(&page.dom);
    let consent = page.consent;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        if let Some(dom) = weak.upgrade() {
            dom.mutate(|tree| tree.remove_attr(consent, "disabled"));
        }
    });

    let policy = LandingPolicy::default();
    let emitter = SyntheticEmitter::default();
    let store = SettingsCenter::in_memory();
    let clock = FixedClock(NOW);
    let started = tokio::time::Instant::now();
    let outcome = LandingAgent::new(&*page.dom, &emitter, &policy, &store, &clock)
        .accept_consent()
        .await;
    assert_eq!(outcome, StepOutcome::Clicked);
    // Checked at 0, 500 and 1000 ms while disabled, clicked at 1500 ms.
    assert_eq!(started.elapsed(), Duration::from_millis(1_500));
    assert_eq!(page.dom.events_on(page.consent, EventKind::Click), 1);
}

#[tokio::test(start_paused = true)]
async fn consent_gives_up_after_twenty_ticks() {
    let page = landing_page("https://appointment.example.test/Global/home/index", &[], true);
    let policy = LandingPolicy::default();
    let emitter = SyntheticEmitter::default();
    let store = SettingsCenter::in_memory();
    let clock = FixedClock(NOW);
    let outcome = LandingAgent::new(&*page.dom, &emitter, &policy, &store, &clock)
        .accept_consent()
        .await;
    assert_eq!(outcome, StepOutcome::NotFound);
    assert_eq!(page.dom.events_on(page.consent, EventKind::Click), 0);
}
