use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use slotpilot_policy_center::{load_snapshot_with_options, LoadOptions, PolicySnapshot};
use slotpilot_settings::SettingsCenter;

use crate::config::Config;

pub struct CliContext {
    config: Config,
    config_path: PathBuf,
}

impl CliContext {
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        Self {
            config,
            config_path,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Result<SettingsCenter> {
        let path = self.config.resolved_settings_path();
        SettingsCenter::with_persistence(&path)
            .with_context(|| format!("Failed to open settings at {}", path.display()))
    }

    /// Builtin policy overlaid with `policy_paths`, env and CLI overrides.
    pub fn policy(&self) -> Result<PolicySnapshot> {
        let options = LoadOptions {
            paths: self.config.policy_paths.clone(),
            include_env: true,
            include_cli_env: true,
        };
        load_snapshot_with_options(&options).context("Failed to load policy")
    }
}
