//! Durable workflow state shared between phase processes.
//!
//! Every phase reads the document for its run identifier, merges its own
//! results, and saves the whole document back with an atomic replace. There
//! is no other channel between phases.

pub mod document;
pub mod id;
pub mod store;

pub use document::{SaveRecord, StateDocument, StatePatch};
pub use id::RunId;
pub use store::{STATE_FILE_NAME, StateStore, WorkflowState};
