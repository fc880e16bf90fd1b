use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use which::which;

/// Configuration for launching or attaching to Chromium.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    pub executable: PathBuf,
    pub user_data_dir: PathBuf,
    pub headless: bool,
    /// Attach to a running browser instead of launching one.
    pub websocket_url: Option<String>,
    /// Page opened when no tab matches `page_url_contains`.
    pub start_url: Option<String>,
    /// Reuse the first open tab whose URL contains this.
    pub page_url_contains: Option<String>,
    pub default_deadline_ms: u64,
    /// How often the page-side mutation counters are drained.
    pub mutation_poll_ms: u64,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: detect_chrome_executable().unwrap_or_default(),
            user_data_dir: default_profile_dir(),
            headless: resolve_headless_default(),
            websocket_url: None,
            start_url: None,
            page_url_contains: None,
            default_deadline_ms: 30_000,
            mutation_poll_ms: 25,
        }
    }
}

fn resolve_headless_default() -> bool {
    match env::var("SLOTPILOT_HEADLESS") {
        Ok(value) => {
            let lower = value.to_ascii_lowercase();
            !matches!(lower.as_str(), "0" | "false" | "no" | "off")
        }
        Err(_) => true,
    }
}

fn default_profile_dir() -> PathBuf {
    if let Ok(path) = env::var("SLOTPILOT_CHROME_PROFILE") {
        return PathBuf::from(path);
    }
    Path::new("./.slotpilot-profile").into()
}

/// `SLOTPILOT_CHROME`, then well-known binaries on `PATH`, then OS install paths.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("SLOTPILOT_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        ["ProgramFiles", "ProgramFiles(x86)", "LocalAppData"]
            .iter()
            .filter_map(|var| env::var(var).ok())
            .map(PathBuf::from)
            .flat_map(|root| {
                [
                    root.join("Google/Chrome/Application/chrome.exe"),
                    root.join("Microsoft/Edge/Application/msedge.exe"),
                ]
            })
            .collect()
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }
}
