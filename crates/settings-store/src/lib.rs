//! Settings that survive across page loads: per-field option indices, the
//! auto-submit and run switches, a custom image URL and the login cooldown.

pub mod cooldown;
pub mod errors;
pub mod model;
pub mod store;

pub use cooldown::{Clock, LoginGate, SystemClock, LOGIN_COOLDOWN_MS};
pub use errors::SettingsError;
pub use model::{BookingSettings, PersistedState, SettingsPatch};
pub use store::{SettingsCenter, SettingsEvent, SettingsStore};
