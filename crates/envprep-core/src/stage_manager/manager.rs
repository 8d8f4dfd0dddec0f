use std::collections::BTreeMap;
use std::process::Command;
use std::sync::Arc;

use crate::kernel::error::Result;
use crate::project::Project;
use crate::stage_manager::options::PrepareOptions;
use crate::stage_manager::pipeline::prepare_in_stages;
use crate::stage_manager::result::PrepareResult;
use crate::stage_manager::{PrepareStage, StageStep};
use crate::storage::{LocalStateFile, ServiceRunState};
use crate::utils::verbose::VerboseLogger;

/// Execute `stage` and everything after it, returning the final result.
///
/// Stages are run in a loop, so chain length does not grow the stack.
pub fn prepare_execute_without_interaction(stage: Box<dyn PrepareStage>) -> Result<PrepareResult> {
    let mut stage = stage;
    loop {
        match stage.execute()? {
            StageStep::Continue(next) => {
                log::debug!("Next stage: {}", next.description_of_action());
                stage = next;
            }
            StageStep::Done(result) => return Ok(result),
        }
    }
}

/// The failure reported for a project that could not be loaded, or `None`
/// if the project has no problems
pub fn project_problems_to_prepare_failure(project: &Project) -> Option<PrepareResult> {
    if project.problems().is_empty() {
        return None;
    }

    let errors = std::iter::once("Unable to load project:".to_string())
        .chain(project.problems().iter().map(|problem| format!("  {}", problem)))
        .collect();
    Some(PrepareResult::failure(Vec::new(), Vec::new(), errors))
}

/// Prepare `project` without asking the user anything.
///
/// Project problems come back as a failed result rather than an error.
/// `keep_going_until_success` is ignored: with nobody to fix things between
/// attempts, retrying would never end.
pub fn prepare_without_interaction(
    project: Arc<Project>,
    environ: &BTreeMap<String, String>,
    options: PrepareOptions,
) -> Result<PrepareResult> {
    if let Some(failure) = project_problems_to_prepare_failure(&project) {
        return Ok(failure);
    }

    let stage = prepare_in_stages(project, environ, options.with_keep_going_until_success(false))?;
    prepare_execute_without_interaction(stage)
}

/// Outcome of one shutdown command run by [`unprepare`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub service_name: String,
    pub command: Vec<String>,
    /// `None` when the command could not be started or was killed by a signal
    pub exit_code: Option<i32>,
}

impl ShutdownReport {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Stop every service recorded in the project's local state.
///
/// Services are handled in name order and their shutdown commands run in
/// the project directory. A failing command is reported and the remaining
/// commands and services still run. Every recorded service's run state is
/// cleared, with or without shutdown commands, and the local state is saved
/// after each service.
pub fn unprepare(project: &Project, verbose: &VerboseLogger) -> Result<Vec<ShutdownReport>> {
    let mut local_state = LocalStateFile::load_for_directory(project.directory_path())?;

    let services: Vec<(String, ServiceRunState)> = local_state
        .get_all_service_run_states()
        .iter()
        .map(|(name, state)| (name.clone(), state.clone()))
        .collect();

    let mut reports = Vec::new();
    for (service_name, state) in services {
        for command in &state.shutdown_commands {
            let Some((program, args)) = command.split_first() else {
                log::warn!("Skipping empty shutdown command for '{}'", service_name);
                verbose.warn(&format!("Empty shutdown command for {}", service_name));
                continue;
            };

            verbose.info(&format!("$ {}", command.join(" ")));
            let exit_code = match Command::new(program)
                .args(args)
                .current_dir(project.directory_path())
                .status()
            {
                Ok(status) => status.code(),
                Err(e) => {
                    log::warn!("Failed to run shutdown command for '{}': {}", service_name, e);
                    None
                }
            };

            match exit_code {
                Some(0) => verbose.info(&format!("Stopped {}", service_name)),
                Some(code) => {
                    log::warn!("Shutdown command for '{}' exited with code {}", service_name, code);
                    verbose.warn(&format!("  exited with code {}", code));
                }
                None => verbose.warn("  did not exit normally"),
            }

            reports.push(ShutdownReport {
                service_name: service_name.clone(),
                command: command.clone(),
                exit_code,
            });
        }

        // Cleared once shutdown was attempted, whatever the outcome
        local_state.set_service_run_state(service_name, ServiceRunState::new());
        local_state.save()?;
    }

    Ok(reports)
}
