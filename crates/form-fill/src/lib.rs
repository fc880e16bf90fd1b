//! Booking form filling: resolve the visible dropdown fields, open and pick
//! each one concurrently, then optionally submit.

pub mod errors;
pub mod orchestrator;
pub mod policy;
pub mod resolver;

pub use errors::{FillError, ResolveError};
pub use orchestrator::{FieldOutcome, FillOrchestrator, FillReport, FillRequest, SubmitOutcome};
pub use policy::{DuplicateLabelPolicy, FormFillPolicy, VocabularyEntry};
pub use resolver::{FieldDescriptor, FieldMap, FieldResolver};
