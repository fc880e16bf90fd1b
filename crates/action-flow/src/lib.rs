//! Workflow layer of the booking agents.
//!
//! [`BookingSequencer`] walks the calendar booking states from `Idle` to
//! `Done` or `Halted`. [`LandingAgent`] handles the pages in front of the
//! booking form.

pub mod errors;
pub mod landing;
pub mod policy;
pub mod random;
pub mod sequencer;
pub mod state;

pub use errors::FlowError;
pub use landing::{LandingAgent, LandingReport, NavTarget, StepOutcome};
pub use policy::{LandingPolicy, SequencerPolicy, SettleDelays};
pub use random::{RandomSource, SeededRandom};
pub use sequencer::BookingSequencer;
pub use state::{HaltReason, RunReport, SelectedDateSet, WorkflowState};
