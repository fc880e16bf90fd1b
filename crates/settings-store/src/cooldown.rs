use tracing::debug;

use crate::errors::SettingsError;
use crate::store::SettingsStore;

pub const LOGIN_COOLDOWN_MS: u64 = 30_000;

/// Wall clock in Unix epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
    }
}

/// Ignores login clicks within the cooldown of the last recorded one.
pub struct LoginGate<'a> {
    store: &'a dyn SettingsStore,
    cooldown_ms: u64,
}

impl<'a> LoginGate<'a> {
    pub fn new(store: &'a dyn SettingsStore) -> Self {
        Self {
            store,
            cooldown_ms: LOGIN_COOLDOWN_MS,
        }
    }

    pub fn with_cooldown(mut self, cooldown_ms: u64) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }

    pub async fn permits(&self, now_ms: u64) -> Result<bool, SettingsError> {
        let last = self.store.snapshot().await?.last_login_click_ms;
        let permitted = match last {
            Some(last) => now_ms.saturating_sub(last) >= self.cooldown_ms && now_ms >= last,
            None => true,
        };
        if !permitted {
            debug!(now_ms, last = ?last, cooldown_ms = self.cooldown_ms, "login click suppressed");
        }
        Ok(permitted)
    }

    pub async fn record(&self, now_ms: u64) -> Result<(), SettingsError> {
        self.store.record_login_click(now_ms).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SettingsCenter;

    #[tokio::test]
    async fn clicks_inside_cooldown_are_refused() {
        let store = SettingsCenter::in_memory();
        let gate = LoginGate::new(&store);
        assert!(gate.permits(1_000_000).await.unwrap());
        gate.record(1_000_000).await.unwrap();

        assert!(!gate.permits(1_000_000).await.unwrap());
        assert!(!gate.permits(1_029_999).await.unwrap());
        assert!(gate.permits(1_030_000).await.unwrap());
        // A clock that went backwards stays inside the cooldown.
        assert!(!gate.permits(900_000).await.unwrap());
    }
}
