use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use cdp_adapter::CdpConfig;

/// `config.yaml` for the CLI. Every field has a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserSection,
    /// Opened when no tab is already on the booking site.
    pub start_url: Option<String>,
    pub settings_path: Option<PathBuf>,
    pub policy_paths: Vec<PathBuf>,
    /// Fixed seed for date and slot picks.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    /// DevTools websocket of a running browser; launches one when unset.
    pub ws_url: Option<String>,
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub user_data_dir: Option<PathBuf>,
    /// Reuse the first tab whose URL contains this.
    pub reuse_tab_matching: Option<String>,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            ws_url: None,
            executable: None,
            headless: false,
            user_data_dir: None,
            reuse_tab_matching: Some("/Global/".into()),
        }
    }
}

impl Config {
    pub fn cdp_config(&self) -> CdpConfig {
        let mut cdp = CdpConfig {
            headless: self.browser.headless,
            websocket_url: self.browser.ws_url.clone(),
            start_url: self.start_url.clone(),
            page_url_contains: self.browser.reuse_tab_matching.clone(),
            ..CdpConfig::default()
        };
        if let Some(executable) = &self.browser.executable {
            cdp.executable = executable.clone();
        }
        if let Some(dir) = &self.browser.user_data_dir {
            cdp.user_data_dir = dir.clone();
        }
        cdp
    }

    /// `settings_path`, else `<data dir>/slotpilot/settings.json`.
    pub fn resolved_settings_path(&self) -> PathBuf {
        if let Some(path) = &self.settings_path {
            return path.clone();
        }
        dirs::data_local_dir()
            .map(|dir| dir.join("slotpilot").join("settings.json"))
            .unwrap_or_else(|| PathBuf::from(".slotpilot/settings.json"))
    }
}
