use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use slotpilot_event_bus::{EventBus, InMemoryBus};

use crate::errors::SettingsError;
use crate::model::{BookingSettings, PersistedState, SettingsPatch};

/// Change notifications published after every successful write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettingsEvent {
    ConfigUpdated(BookingSettings),
    RunStateChanged(bool),
    ImageUrlSaved(Option<String>),
    LoginRecorded(u64),
}

/// Explicit settings interface injected into the agents.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn snapshot(&self) -> Result<PersistedState, SettingsError>;

    async fn update(&self, patch: SettingsPatch) -> Result<BookingSettings, SettingsError>;

    async fn set_image_url(&self, url: Option<String>) -> Result<(), SettingsError>;

    async fn set_run_enabled(&self, enabled: bool) -> Result<(), SettingsError>;

    async fn record_login_click(&self, at_ms: u64) -> Result<(), SettingsError>;

    fn subscribe(&self) -> broadcast::Receiver<SettingsEvent>;

    async fn settings(&self) -> Result<BookingSettings, SettingsError> {
        Ok(self.snapshot().await?.booking_config)
    }

    async fn run_enabled(&self) -> Result<bool, SettingsError> {
        Ok(self.snapshot().await?.run_enabled)
    }
}

/// Settings held in memory, optionally mirrored to a JSON file.
pub struct SettingsCenter {
    state: Mutex<PersistedState>,
    storage_path: Option<PathBuf>,
    bus: Arc<InMemoryBus<SettingsEvent>>,
}

impl SettingsCenter {
    pub fn in_memory() -> Self {
        Self::from_state(PersistedState::default(), None)
    }

    fn from_state(state: PersistedState, storage_path: Option<PathBuf>) -> Self {
        Self {
            state: Mutex::new(state),
            storage_path,
            bus: InMemoryBus::new(32),
        }
    }

    /// Loads `path` if it exists; every later write is persisted there.
    pub fn with_persistence(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let state = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => PersistedState::default(),
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|source| SettingsError::Corrupt {
                    path: path.display().to_string(),
                    source,
                })?
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file yet, using defaults");
                PersistedState::default()
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        Ok(Self::from_state(state, Some(path)))
    }

    pub fn storage_path(&self) -> Option<&Path> {
        self.storage_path.as_deref()
    }

    pub fn bus(&self) -> Arc<InMemoryBus<SettingsEvent>> {
        self.bus.clone()
    }

    fn persist(&self, state: &PersistedState) -> Result<(), SettingsError> {
        let Some(path) = self.storage_path.as_ref() else {
            return Ok(());
        };
        let io_err = |source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let json = serde_json::to_vec_pretty(state).map_err(|source| SettingsError::Corrupt {
            path: path.display().to_string(),
            source,
        })?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(io_err)?;
        fs::rename(&staging, path).map_err(io_err)
    }

    /// Applies `change` and persists; the in-memory state is only replaced
    /// when the write succeeded.
    fn write<F>(&self, change: F) -> Result<PersistedState, SettingsError>
    where
        F: FnOnce(&mut PersistedState),
    {
        let mut guard = self.state.lock();
        let mut next = guard.clone();
        change(&mut next);
        self.persist(&next)?;
        *guard = next.clone();
        Ok(next)
    }

    async fn announce(&self, event: SettingsEvent) {
        if let Err(err) = self.bus.publish(event).await {
            warn!(error = %err, "settings event not delivered");
        }
    }
}

#[async_trait]
impl SettingsStore for SettingsCenter {
    async fn snapshot(&self) -> Result<PersistedState, SettingsError> {
        Ok(self.state.lock().clone())
    }

    async fn update(&self, patch: SettingsPatch) -> Result<BookingSettings, SettingsError> {
        let state = self.write(|state| patch.apply(&mut state.booking_config))?;
        self.announce(SettingsEvent::ConfigUpdated(state.booking_config.clone()))
            .await;
        Ok(state.booking_config)
    }

    async fn set_image_url(&self, url: Option<String>) -> Result<(), SettingsError> {
        let url = url.filter(|u| !u.trim().is_empty());
        self.write(|state| state.image_url = url.clone())?;
        self.announce(SettingsEvent::ImageUrlSaved(url)).await;
        Ok(())
    }

    async fn set_run_enabled(&self, enabled: bool) -> Result<(), SettingsError> {
        self.write(|state| state.run_enabled = enabled)?;
        self.announce(SettingsEvent::RunStateChanged(enabled)).await;
        Ok(())
    }

    async fn record_login_click(&self, at_ms: u64) -> Result<(), SettingsError> {
        self.write(|state| state.last_login_click_ms = Some(at_ms))?;
        self.announce(SettingsEvent::LoginRecorded(at_ms)).await;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingsEvent> {
        self.bus.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotpilot_event_bus::to_mpsc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn file_store_round_trips_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let store = SettingsCenter::with_persistence(&path).unwrap();
        let mut patch = SettingsPatch::default();
        patch.visa_type_index = Some(4);
        patch.auto_submit = Some(true);
        store.update(patch).await.unwrap();
        store.set_run_enabled(true).await.unwrap();
        store
            .set_image_url(Some("https://img.example.test/a.png".into()))
            .await
            .unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let reopened = SettingsCenter::with_persistence(&path).unwrap();
        let state = reopened.snapshot().await.unwrap();
        assert_eq!(state.booking_config.visa_type_index, 4);
        assert!(state.booking_config.auto_submit);
        assert!(state.run_enabled);
        assert_eq!(
            state.image_url.as_deref(),
            Some("https://img.example.test/a.png")
        );
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            SettingsCenter::with_persistence(&path),
            Err(SettingsError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn writes_publish_events() {
        let store = SettingsCenter::in_memory();
        let mut rx = to_mpsc(store.bus(), 8);
        store.set_run_enabled(true).await.unwrap();
        store.set_image_url(Some("  ".into())).await.unwrap();
        store
            .update(SettingsPatch {
                mission_index: Some(2),
                ..SettingsPatch::default()
            })
            .await
            .unwrap();

        assert_eq!(rx.recv().await, Some(SettingsEvent::RunStateChanged(true)));
        assert_eq!(rx.recv().await, Some(SettingsEvent::ImageUrlSaved(None)));
        match rx.recv().await {
            Some(SettingsEvent::ConfigUpdated(settings)) => assert_eq!(settings.mission_index, 2),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
