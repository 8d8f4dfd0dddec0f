//! # Envprep Core
//!
//! Prepares a declaratively described project to run: checks the environment
//! variables and resources it requires, asks pluggable providers to supply the
//! missing ones, and assembles the final environment and command invocation.
//!
//! Preparation is split into resumable [`PrepareStage`]s so a front end can
//! pause between steps to let the user configure things.
pub mod kernel;
pub mod plugin_system;
pub mod project;
pub mod requirement;
pub mod stage_manager;
pub mod storage;
pub mod ui_bridge;
pub mod utils;

// Re-export key public types for callers and provider crates
pub use kernel::error::{Error, Result};
pub use plugin_system::{EnvVarProvider, PluginRegistry, ProvideContext, ProvideMode, Provider};
pub use project::{CommandExecInfo, CommandSpec, Project, ProjectBuilder};
pub use requirement::{
    EnvVarRequirement, ProviderAnalysis, Requirement, RequirementExt, RequirementOptions, RequirementStatus,
};
pub use stage_manager::{
    prepare_execute_without_interaction, prepare_in_stages, prepare_without_interaction, unprepare,
    AndThenStage, ConfigurePrepareContext, FunctionStage, PrepareOptions, PrepareResult, PrepareStage,
    ShutdownReport, StageStep,
};
pub use storage::{LocalStateFile, ServiceRunState};
pub use ui_bridge::{drive_stages, prepare_with_ui, PrepareUi};
pub use utils::environment::Environment;
pub use utils::verbose::{VerboseLogger, VerboseScope};

#[cfg(test)]
mod tests;
