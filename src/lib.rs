#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod config;
pub mod consistency;
pub mod error;
pub mod model;
pub mod observability;
pub mod oracle;
pub mod pipeline;
pub mod providers;
pub mod review;
pub mod scoring;
pub mod selector;

pub use config::Config;
pub use error::{BestshotError, PipelineError, Result};
pub use model::{
    Candidate, ComparativeReview, ConsistencyResult, ConsistencyStatus, GenerationRequest,
    ImageRef, PipelineRunResult, ScoringResult,
};
pub use pipeline::{PipelineMode, PipelineOrchestrator};
