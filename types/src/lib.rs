//! Core domain types for runloop.
//!
//! This crate contains the protocol vocabulary shared by the configuration
//! layer and the engine: identifiers, deadlines, failure records and HTTP
//! status classification. No IO, no async.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod deadline;
mod failure;
mod ids;
pub mod protocol;
mod status;

pub use deadline::{Deadline, DeadlineError};
pub use failure::Failure;
pub use ids::RequestId;
pub use status::StatusError;
