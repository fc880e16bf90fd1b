use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use tracing::{debug, info, warn};

use action_flow::{BookingSequencer, LandingAgent, LandingPolicy, RandomSource, SeededRandom};
use cdp_adapter::{BrowserSession, ChromiumDom};
use dom_port::DomPort;
use form_fill::{FillOrchestrator, FillRequest};
use slotpilot_core_types::RunId;
use slotpilot_policy_center::PolicySnapshot;
use slotpilot_settings::{PersistedState, SettingsCenter, SettingsStore, SystemClock};
use tool_click::{redact, SyntheticEmitter};

use super::context::CliContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FlowKind {
    /// Pick from the current page URL
    Auto,
    /// Calendar, time slot and submit
    Slots,
    /// Fill the appointment form dropdowns
    Form,
    /// Consent, navigation and login helpers
    Landing,
}

/// The agent a run ends up driving.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Slots,
    Form,
    Landing,
}

impl FlowKind {
    pub fn resolve(self, url: &str, landing: &LandingPolicy) -> Flow {
        match self {
            FlowKind::Slots => Flow::Slots,
            FlowKind::Form => Flow::Form,
            FlowKind::Landing => Flow::Landing,
            FlowKind::Auto if is_form_page(url) => Flow::Form,
            FlowKind::Auto if landing.is_account_page(url) || landing.is_pending_page(url) => {
                Flow::Landing
            }
            FlowKind::Auto => Flow::Slots,
        }
    }
}

fn is_form_page(url: &str) -> bool {
    url.to_ascii_lowercase().contains("/appointment/visatype")
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Which agent to run
    #[arg(long, value_enum, default_value_t = FlowKind::Auto)]
    pub flow: FlowKind,

    /// Seed for date and slot picks (overrides the config file)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Navigate the tab here before running
    #[arg(long)]
    pub url: Option<String>,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext) -> Result<()> {
    let store = ctx.settings()?;
    let state = store.snapshot().await?;
    if !state.run_enabled {
        bail!("run is disabled; enable it with `slotpilot settings enable`");
    }
    let policy = ctx.policy()?;
    debug!(config = %ctx.config_path().display(), "policy loaded");

    let session = BrowserSession::start(ctx.config().cdp_config())
        .await
        .context("Failed to start the browser session")?;
    let dom = session.page().await.context("Failed to open a page")?;
    if let Some(url) = &args.url {
        dom.goto(url).await.context("Failed to navigate")?;
    }

    let seed = args.seed.or(ctx.config().seed);
    let outcome = tokio::select! {
        result = execute(args.flow, &dom, &policy, &store, &state, seed) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("run cancelled");
            Ok(())
        }
    };

    if let Err(err) = session.close().await {
        warn!(%err, "browser session did not close cleanly");
    }
    outcome
}

async fn execute(
    flow: FlowKind,
    dom: &ChromiumDom,
    policy: &PolicySnapshot,
    store: &SettingsCenter,
    state: &PersistedState,
    seed: Option<u64>,
) -> Result<()> {
    let url = dom.current_url().await?;
    let flow = flow.resolve(&url, &policy.landing);
    let emitter = SyntheticEmitter::new(policy.click.clone());
    let run_id = RunId::new();
    info!(run_id = %run_id, ?flow, url = %redact::url(&url), "starting run");

    match flow {
        Flow::Slots => {
            let rng: Box<dyn RandomSource> = match seed {
                Some(seed) => Box::new(SeededRandom::from_seed(seed)),
                None => Box::new(SeededRandom::from_entropy()),
            };
            let report = BookingSequencer::new(dom, &emitter, &policy.sequencer, rng)
                .run(run_id)
                .await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if let Some(reason) = report.halt_reason() {
                bail!("booking halted: {reason}");
            }
        }
        Flow::Form => {
            let request = FillRequest {
                indices: state.booking_config.indices(),
                auto_submit: state.booking_config.auto_submit,
            };
            let report = FillOrchestrator::new(dom, &emitter, &policy.form)
                .run(run_id, &request)
                .await?;
            println!(
                "form_ready={} selected={}/{} submit={:?} latency_ms={}",
                report.form_ready,
                report.selected(),
                report.fields.len(),
                report.submit,
                report.latency_ms
            );
            for (field, outcome) in &report.fields {
                println!("  {:<12} {:?}", field.key(), outcome);
            }
        }
        Flow::Landing => {
            let clock = SystemClock;
            let report = LandingAgent::new(dom, &emitter, &policy.landing, store, &clock)
                .run()
                .await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
