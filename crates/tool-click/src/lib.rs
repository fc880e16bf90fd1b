pub mod api;
pub mod errors;
pub mod model;
pub mod policy;
pub mod redact;

mod precheck;
mod runner;

pub use api::{InteractionEmitter, SyntheticEmitter};
pub use errors::ClickError;
pub use model::{ClickOutcome, ClickReport, SkipReason};
pub use policy::ClickPolicyView;
