#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::struct_field_names,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::return_self_not_must_use
)]

pub mod archivist;
pub mod cli;
pub mod config;
pub mod critic;
pub mod culture;
pub mod draft;
pub mod error;
pub mod orchestrator;
pub mod queen;
pub mod scout;
pub mod trajectory;
pub mod util;

pub use config::AtelierConfig;
pub use error::{AtelierError, Result};
pub use orchestrator::{Orchestrator, PipelineEvent, RunIntent, RunOutcome};
