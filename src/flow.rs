//! CTA flow builder: an ordered list of message steps whose buttons link to
//! other steps.

use thiserror::Error;

use crate::api::ApiError;

pub mod editor;
pub mod file;
pub mod graph;
pub mod journey;
pub mod model;

pub use editor::{FlowBackend, FlowEditor, FlowState};
pub use file::{flow_schema, load_flow_from_file, save_flow_to_file};
pub use graph::BrokenLink;
pub use journey::JourneyOutcome;
pub use model::{ButtonLink, Flow, FlowStep, StepPatch};

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("step `{0}` not found")]
    StepNotFound(String),
    #[error("index {index} out of range for {len} steps")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Backend(#[from] ApiError),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("flow document error: {0}")]
    Serialization(String),
}
