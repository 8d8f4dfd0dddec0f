//! # Envprep Core Stage Manager
//!
//! The staged preparation engine. A preparation run is a chain of
//! [`PrepareStage`]s unrolled one `execute` call at a time; each call
//! either yields the next stage or finishes with a [`PrepareResult`].
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`stages`]**: [`FunctionStage`] and [`AndThenStage`], the two
//!   concrete stage kinds.
//! - **[`pipeline`]**: builds the stage chain for a project
//!   ([`prepare_in_stages`]).
//! - **[`manager`]**: drivers that run a chain to completion, plus
//!   [`unprepare`].
//! - **[`dependency`]**: deterministic topological sort with cycle
//!   reporting.
//! - **[`context`]**: [`ConfigurePrepareContext`] offered to front ends
//!   between stages.
//! - **[`result`]**: [`PrepareResult`].
//! - **[`error`]**: [`PrepareSystemError`](error::PrepareSystemError).
pub mod context;
pub mod dependency;
pub mod error;
pub mod manager;
pub mod options;
pub mod pipeline;
pub mod result;
pub mod stages;

use std::fmt;

use crate::kernel::error::Result;
use crate::requirement::RequirementStatus;

/// One resumable unit of a preparation run.
///
/// A stage executes at most once. Executing it yields either the next
/// stage or the terminal result of the run.
pub trait PrepareStage: Send {
    /// What executing this stage will do
    fn description_of_action(&self) -> &str;

    /// Requirements the user may configure before `execute`, if any
    fn configure(&self) -> Option<ConfigurePrepareContext>;

    /// Do the work
    fn execute(&mut self) -> Result<StageStep>;

    /// Whether execution produced a failure; false before `execute`
    fn failed(&self) -> bool;

    /// The result recorded by `execute`
    fn result(&self) -> Result<&PrepareResult>;

    /// Statuses as of when the stage was created
    fn statuses_before_execute(&self) -> &[RequirementStatus];

    /// Statuses after `execute`; an error before the stage has executed
    fn statuses_after_execute(&self) -> Result<&[RequirementStatus]>;
}

/// What executing a stage produced
pub enum StageStep {
    /// More work remains
    Continue(Box<dyn PrepareStage>),
    /// The run is over
    Done(PrepareResult),
}

impl fmt::Debug for StageStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStep::Continue(stage) => f
                .debug_tuple("Continue")
                .field(&stage.description_of_action())
                .finish(),
            StageStep::Done(result) => f.debug_tuple("Done").field(result).finish(),
        }
    }
}

// Re-export important types
pub use context::ConfigurePrepareContext;
pub use manager::{
    prepare_execute_without_interaction, prepare_without_interaction, project_problems_to_prepare_failure,
    unprepare, ShutdownReport,
};
pub use options::PrepareOptions;
pub use pipeline::prepare_in_stages;
pub use result::{PrepareFailure, PrepareResult, PrepareSuccess};
pub use stages::{AndThenStage, FunctionStage};
