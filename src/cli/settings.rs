use anyhow::Result;
use clap::{Args, Subcommand};
use slotpilot_settings::{SettingsEvent, SettingsPatch, SettingsStore};
use tracing::debug;

use super::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommand,
}

#[derive(Subcommand, Clone, Debug)]
pub enum SettingsCommand {
    /// Print the persisted settings as YAML
    Show,
    /// Set one booking value, e.g. `visaTypeIndex 2` or `autoSubmit true`
    Set { key: String, value: String },
    /// Allow `run` to start
    Enable,
    /// Refuse `run` until enabled again
    Disable,
    /// Save the custom image URL; an empty value clears it
    ImageUrl { url: String },
}

pub async fn cmd_settings(args: SettingsArgs, ctx: &CliContext) -> Result<()> {
    let store = ctx.settings()?;
    let mut events = store.subscribe();

    match args.command {
        SettingsCommand::Show => {
            let state = store.snapshot().await?;
            print!("{}", serde_yaml::to_string(&state)?);
            return Ok(());
        }
        SettingsCommand::Set { key, value } => {
            let patch = SettingsPatch::from_pair(&key, &value)?;
            let updated = store.update(patch).await?;
            println!("{key} = {value}");
            debug!(?updated, "booking settings saved");
        }
        SettingsCommand::Enable => {
            store.set_run_enabled(true).await?;
            println!("run enabled");
        }
        SettingsCommand::Disable => {
            store.set_run_enabled(false).await?;
            println!("run disabled");
        }
        SettingsCommand::ImageUrl { url } => {
            let url = (!url.trim().is_empty()).then_some(url);
            store.set_image_url(url.clone()).await?;
            match url {
                Some(url) => println!("image url saved: {url}"),
                None => println!("image url cleared"),
            }
        }
    }

    if let Ok(event) = events.try_recv() {
        debug!(event = describe(&event), "settings event published");
    }
    Ok(())
}

fn describe(event: &SettingsEvent) -> &'static str {
    match event {
        SettingsEvent::ConfigUpdated(_) => "config_updated",
        SettingsEvent::RunStateChanged(_) => "run_state_changed",
        SettingsEvent::ImageUrlSaved(_) => "image_url_saved",
        SettingsEvent::LoginRecorded(_) => "login_recorded",
    }
}
