//! Waiting primitives shared by the booking agents.
//!
//! [`ConditionPoller`] is the base: every other wait here is a poller with a
//! particular condition and exhaustion behaviour.

pub mod condition;
pub mod driver;
pub mod overlay;
pub mod poller;
pub mod policy;
pub mod tick;

pub use condition::{condition_fn, Condition, FnCondition, Present, VisibleMatch};
pub use driver::{DriveOutcome, RetryDriver};
pub use overlay::{GateOutcome, LoaderCleared, OverlayGate, DEFAULT_LOADER_SELECTOR};
pub use poller::{ConditionPoller, ExhaustReason, PollOutcome};
pub use policy::{RetryPolicy, SchedulingPrimitive};
pub use tick::{FrameTicks, MutationTicks, TickSource, TimerTicks};
