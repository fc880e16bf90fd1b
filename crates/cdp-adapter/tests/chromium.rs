//! Runs the DOM port against a real Chromium.
//!
//! ```bash
//! export SLOTPILOT_USE_REAL_CHROME=1
//! export SLOTPILOT_CHROME=/usr/bin/chromium   # optional
//! cargo test -p cdp-adapter --test chromium -- --nocapture
//! ```

use std::env;
use std::time::Duration;

use cdp_adapter::{BrowserSession, CdpConfig};
use dom_port::{DomError, DomPort, EventKind, SyntheticEvent};
use tempfile::TempDir;

const PAGE: &str = r#"<html><body>
<form>
  <span class="k-dropdown-wrap"><span class="k-input">--Select--</span><span class="k-select">v</span></span>
  <button id="btnSubmit" disabled>Submit</button>
  <div id="hidden" style="display:none">gone</div>
</form>
<script>
  document.querySelector('.k-select').addEventListener('click', () => {
    document.querySelector('.k-input').textContent = '09:00';
    document.getElementById('btnSubmit').removeAttribute('disabled');
  });
</script>
</body></html>"#;

fn should_run_real_tests() -> bool {
    env::var("SLOTPILOT_USE_REAL_CHROME")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn test_config() -> (CdpConfig, TempDir) {
    let profile = tempfile::tempdir().expect("create temporary chrome profile");
    let cfg = CdpConfig {
        headless: true,
        user_data_dir: profile.path().into(),
        start_url: Some(format!("data:text/html,{}", PAGE.replace('#', "%23"))),
        ..CdpConfig::default()
    };
    (cfg, profile)
}

#[tokio::test(flavor = "multi_thread")]
async fn port_round_trips_against_chromium() {
    if !should_run_real_tests() {
        println!("Skipping real browser test (SLOTPILOT_USE_REAL_CHROME not set)");
        return;
    }
    let (cfg, _profile) = test_config();
    let session = BrowserSession::start(cfg).await.expect("launch chromium");
    let dom = session.page().await.expect("open page");

    let trigger = dom.query_first(".k-select").await.unwrap().expect("trigger");
    let wrap = dom
        .closest(&trigger, "span.k-dropdown-wrap")
        .await
        .unwrap()
        .expect("wrap");
    let input = dom.query_within(&wrap, ".k-input").await.unwrap();
    assert_eq!(input.len(), 1);

    let submit = dom.query_xpath("/html/body/form/button").await.unwrap().expect("button");
    let state = dom.inspect(&submit).await.unwrap().expect("state");
    assert!(state.disabled);
    assert!(state.laid_out);
    assert_eq!(state.attr("id"), Some("btnSubmit"));

    let hidden = dom.query_first("#hidden").await.unwrap().expect("hidden");
    assert!(!dom.inspect(&hidden).await.unwrap().unwrap().laid_out);

    let mut mutations = dom.observe("form").await.unwrap();
    let at = dom.inspect(&trigger).await.unwrap().unwrap().rect.center();
    dom.dispatch(&trigger, &SyntheticEvent::pointer(EventKind::Click, at))
        .await
        .unwrap();
    let batch = tokio::time::timeout(Duration::from_secs(2), mutations.next())
        .await
        .expect("mutation delivered")
        .expect("stream open");
    assert!(batch.records >= 1);

    let text = dom.inspect(&input[0]).await.unwrap().unwrap().text;
    assert_eq!(text, "09:00");
    assert!(!dom.inspect(&submit).await.unwrap().unwrap().disabled);

    dom.next_frame().await.unwrap();
    assert!(dom.current_url().await.unwrap().starts_with("data:text/html"));

    let err = dom.query_all("a[").await.unwrap_err();
    assert!(matches!(err, DomError::InvalidSelector { .. }));

    session.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn rerendered_nodes_do_not_pile_up_in_the_registry() {
    if !should_run_real_tests() {
        println!("Skipping real browser test (SLOTPILOT_USE_REAL_CHROME not set)");
        return;
    }
    let (cfg, _profile) = test_config();
    let session = BrowserSession::start(cfg).await.expect("launch chromium");
    let dom = session.page().await.expect("open page");

    // Each round re-renders the slot list and polls it, like a slot retry loop.
    for _ in 0..10 {
        dom.page()
            .evaluate(
                "(() => { document.querySelectorAll('.slot').forEach((el) => el.remove()); \
                 for (let i = 0; i < 100; i++) { const li = document.createElement('li'); \
                 li.className = 'slot'; document.body.appendChild(li); } return true; })()",
            )
            .await
            .expect("re-render slots");
        let slots = dom.query_all(".slot").await.unwrap();
        assert_eq!(slots.len(), 100);
    }

    let registered = dom.registered_handles().await.expect("registry size");
    assert!(registered <= 100 + 256, "registry kept {registered} handles");

    session.close().await.expect("close chromium");
}
