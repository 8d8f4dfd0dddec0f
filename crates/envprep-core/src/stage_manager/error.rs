//! # Envprep Core Stage Manager Errors
//!
//! Defines [`PrepareSystemError`], the faults the staged preparation engine
//! raises when it is misused or handed something it cannot work with.
//!
//! Unmet requirements are not errors. They are reported through a failed
//! `PrepareResult`, which keeps the pipeline resumable.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrepareSystemError {
    #[error("Stage '{stage}' has no result until it has finished executing")]
    ResultNotAvailable { stage: String },

    #[error("Stage '{stage}' has no post-execution statuses until it has executed")]
    StatusesNotAvailable { stage: String },

    #[error("Stage '{stage}' has already been executed")]
    StageAlreadyExecuted { stage: String },

    #[error("Stage '{stage}' finished without setting a result")]
    ResultNotSet { stage: String },

    #[error("Invalid provide mode '{mode}', expected one of: production, development, check")]
    InvalidProvideMode { mode: String },

    #[error("Required environment variable '{key}' is missing from the starting environment")]
    MissingEnvironmentKey { key: String },

    #[error("Project has unresolved problems: {}", problems.join("; "))]
    ProjectHasProblems { problems: Vec<String> },

    #[error("Dependency cycle between: {}", keys.join(", "))]
    DependencyCycle { keys: Vec<String> },

    #[error("Requirement discovery did not settle after {rounds} rounds")]
    RequirementDiscoveryDiverged { rounds: usize },

    #[error("Command '{command_name}' is not defined by the project")]
    UnknownCommand { command_name: String },

    #[error("Command '{command_name}' has nothing to run")]
    EmptyCommand { command_name: String },
}
