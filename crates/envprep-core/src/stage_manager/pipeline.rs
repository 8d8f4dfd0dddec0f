use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use crate::kernel::constants::{
    MAX_REQUIREMENT_DISCOVERY_ROUNDS, PATH_VAR, PROJECT_DIR_VAR, SET_UP_STAGE_DESCRIPTION,
};
use crate::kernel::error::{Error, Result};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::{ProvideContext, ProvideMode};
use crate::project::Project;
use crate::requirement::{refresh_status_list, RequirementExt, RequirementOptions, RequirementStatus};
use crate::stage_manager::context::{ConfigurePrepareContext, SharedState};
use crate::stage_manager::dependency::toposort;
use crate::stage_manager::error::PrepareSystemError;
use crate::stage_manager::options::PrepareOptions;
use crate::stage_manager::result::PrepareResult;
use crate::stage_manager::stages::{AndThenStage, FunctionStage};
use crate::stage_manager::PrepareStage;
use crate::storage::LocalStateFile;
use crate::utils::environment::Environment;

/// Start preparing `project`, returning the first stage.
///
/// `environ` is left untouched; the run works on its own environment with
/// `PROJECT_DIR` added. Fails if the project has problems or `environ` has
/// no `PATH`.
pub fn prepare_in_stages(
    project: Arc<Project>,
    environ: &BTreeMap<String, String>,
    options: PrepareOptions,
) -> Result<Box<dyn PrepareStage>> {
    if !project.problems().is_empty() {
        return Err(PrepareSystemError::ProjectHasProblems {
            problems: project.problems().to_vec(),
        }
        .into());
    }
    if !environ.contains_key(PATH_VAR) {
        return Err(PrepareSystemError::MissingEnvironmentKey {
            key: PATH_VAR.to_string(),
        }
        .into());
    }

    let mut run_environ = Environment::from_map(environ);
    run_environ.set(
        PROJECT_DIR_VAR,
        project.directory_path().to_string_lossy().into_owned(),
    );

    let local_state = LocalStateFile::load_for_directory(project.directory_path())?;

    let mut statuses: Vec<RequirementStatus> = project
        .requirements()
        .iter()
        .map(|requirement| requirement.check_status(&run_environ, &local_state))
        .collect();

    let added =
        add_missing_env_var_requirements(&project, &run_environ, &local_state, &mut statuses)?;
    if added > 0 {
        log::debug!(
            "Added {} requirement(s) for variables other requirements depend on",
            added
        );
    }
    log::info!(
        "Preparing project '{}' in {} mode with {} requirement(s)",
        project.name(),
        options.mode,
        statuses.len()
    );

    let pipeline = Pipeline {
        project,
        shared: SharedState::new(run_environ, local_state),
        options: Arc::new(options),
    };
    pipeline.process_requirement_statuses(statuses.clone(), statuses)
}

/// Create requirements for variables that providers depend on but nobody
/// declared, repeating until nothing new turns up.
///
/// Returns how many requirements were added. Gives up with
/// `RequirementDiscoveryDiverged` if providers keep naming new variables.
pub fn add_missing_env_var_requirements(
    project: &Project,
    environ: &Environment,
    local_state: &LocalStateFile,
    statuses: &mut Vec<RequirementStatus>,
) -> Result<usize> {
    let mut known: HashSet<String> = statuses
        .iter()
        .map(|status| status.env_var().to_string())
        .collect();
    let mut added = 0;

    for _ in 0..MAX_REQUIREMENT_DISCOVERY_ROUNDS {
        let mut needed = BTreeSet::new();
        for status in statuses.iter() {
            let requirement = status.requirement().as_ref();
            let provider = status.provider();
            needed.extend(provider.missing_env_vars_to_configure(requirement, environ, local_state));
            needed.extend(provider.missing_env_vars_to_provide(requirement, environ, local_state));
        }

        let mut created_any = false;
        for env_var in needed {
            if known.contains(&env_var) {
                continue;
            }
            let requirement = project
                .plugin_registry()
                .find_requirement_by_env_var(&env_var, RequirementOptions::new())?;
            log::debug!("Auto-adding requirement for {}", env_var);
            statuses.push(requirement.check_status(environ, local_state));
            known.insert(env_var);
            added += 1;
            created_any = true;
        }

        if !created_any {
            return Ok(added);
        }
    }

    Err(PrepareSystemError::RequirementDiscoveryDiverged {
        rounds: MAX_REQUIREMENT_DISCOVERY_ROUNDS,
    }
    .into())
}

fn sort_statuses<F>(
    environ: &Environment,
    statuses: Vec<RequirementStatus>,
    missing_vars: F,
) -> Result<Vec<RequirementStatus>>
where
    F: Fn(&RequirementStatus) -> BTreeSet<String>,
{
    toposort(
        statuses,
        |status| status.env_var().to_string(),
        missing_vars,
        |key| environ.is_set(key),
    )
}

/// Split `statuses` into the group that can be configured right away and
/// the rest.
///
/// After sorting by configure-time dependencies, `head` runs up to and
/// including the first status whose provider still needs variables to
/// configure it; `tail` is everything after that, blocked or not.
pub fn partition_first_group_to_configure(
    environ: &Environment,
    local_state: &LocalStateFile,
    statuses: Vec<RequirementStatus>,
) -> Result<(Vec<RequirementStatus>, Vec<RequirementStatus>)> {
    let sorted = sort_statuses(environ, statuses, |status| {
        status.analysis().missing_env_vars_to_configure.clone()
    })?;

    let split_at = sorted
        .iter()
        .position(|status| {
            !status
                .provider()
                .missing_env_vars_to_configure(status.requirement().as_ref(), environ, local_state)
                .is_empty()
        })
        .map_or(sorted.len(), |blocking| blocking + 1);

    let mut head = sorted;
    let tail = head.split_off(split_at);
    Ok((head, tail))
}

/// State shared by every stage of one run
#[derive(Clone)]
struct Pipeline {
    project: Arc<Project>,
    shared: SharedState,
    options: Arc<PrepareOptions>,
}

impl Pipeline {
    fn process_requirement_statuses(
        &self,
        current: Vec<RequirementStatus>,
        all: Vec<RequirementStatus>,
    ) -> Result<Box<dyn PrepareStage>> {
        let (head, tail) = {
            let environ = self.shared.environ();
            let local_state = self.shared.local_state();
            partition_first_group_to_configure(&environ, &local_state, current)?
        };

        // Always at least one stage, but never one for an empty group when
        // the other group has work
        if head.is_empty() {
            return Ok(self.configure_and_provide(tail, all));
        }
        if tail.is_empty() {
            return Ok(self.configure_and_provide(head, all));
        }

        let first = self.configure_and_provide(head, all);
        let pipeline = self.clone();
        Ok(Box::new(AndThenStage::new(first, move |updated_all| {
            let updated = refresh_status_list(&tail, &updated_all);
            pipeline
                .process_requirement_statuses(updated, updated_all)
                .map(Some)
        })))
    }

    fn configure_and_provide(
        &self,
        statuses: Vec<RequirementStatus>,
        all: Vec<RequirementStatus>,
    ) -> Box<dyn PrepareStage> {
        let configure_context = ConfigurePrepareContext::new(self.shared.clone(), statuses.clone());
        let pipeline = self.clone();
        Box::new(
            FunctionStage::new(SET_UP_STAGE_DESCRIPTION, all, move |stage| {
                pipeline.provide(stage, statuses)
            })
            .with_configure_context(configure_context),
        )
    }

    fn provide(
        &self,
        stage: &mut FunctionStage,
        statuses: Vec<RequirementStatus>,
    ) -> Result<Option<Box<dyn PrepareStage>>> {
        let verbose = &self.options.verbose;
        let mut environ = self.shared.environ();
        let mut local_state = self.shared.local_state();

        let sorted = match sort_statuses(&environ, statuses, |status| {
            status.analysis().missing_env_vars_to_provide.clone()
        }) {
            Ok(sorted) => sorted,
            Err(Error::PrepareSystem(cycle @ PrepareSystemError::DependencyCycle { .. })) => {
                log::warn!("{}", cycle);
                let statuses = stage.statuses_before_execute().to_vec();
                stage.set_result(PrepareResult::failure(
                    Vec::new(),
                    statuses,
                    vec![cycle.to_string()],
                ));
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        // Configuration may have happened since these statuses were taken
        let mut rechecked: Vec<RequirementStatus> = sorted
            .iter()
            .map(|status| status.recheck(&environ, &local_state))
            .collect();

        let mut logs = Vec::new();
        let mut errors = Vec::new();
        let mut did_any_providing = false;

        for status in &rechecked {
            if !self.options.may_provide(status.env_var()) || status.has_been_provided() {
                continue;
            }

            did_any_providing = true;
            verbose.debug(&format!(
                "Providing {} with provider '{}'",
                status.env_var(),
                status.provider().id()
            ));
            let mut context = ProvideContext::new(
                &mut environ,
                &mut local_state,
                status,
                self.options.mode,
                verbose.clone(),
            );
            if let Err(e) = status
                .provider()
                .provide(status.requirement().as_ref(), &mut context)
            {
                let failure = PluginSystemError::ProvideFailed {
                    provider_id: status.provider().id().to_string(),
                    env_var: status.env_var().to_string(),
                    message: e.to_string(),
                };
                log::warn!("{}", failure);
                context.append_error(failure.to_string());
            }
            let (provide_logs, provide_errors) = context.into_output();
            logs.extend(provide_logs);
            errors.extend(provide_errors);
        }

        // Providing one requirement can change what the others see
        if did_any_providing {
            rechecked = rechecked
                .iter()
                .map(|status| status.recheck(&environ, &local_state))
                .collect();
        }

        if local_state.is_dirty() && self.options.mode != ProvideMode::Check {
            local_state.save()?;
        }

        let mut failed = false;
        for status in rechecked.iter().filter(|status| !status.is_satisfied()) {
            errors.push(format!(
                "missing requirement to run this project: {}",
                status.requirement().title()
            ));
            errors.push(format!("  {}", status.status_description()));
            failed = true;
        }

        let result_statuses = refresh_status_list(stage.statuses_before_execute(), &rechecked);

        if failed {
            stage.set_result(PrepareResult::failure(logs, result_statuses, errors));
            if !self.options.keep_going_until_success {
                return Ok(None);
            }
            let all = stage.statuses_after_execute()?.to_vec();
            verbose.debug("Requirements still missing, setting up again");
            return Ok(Some(self.configure_and_provide(rechecked, all)));
        }

        let final_environ = environ.to_map();
        let command_exec_info = self
            .project
            .exec_info_for_environment(&final_environ, &self.options.extra_command_args)?;
        stage.set_result(PrepareResult::success(
            logs,
            result_statuses,
            command_exec_info,
            final_environ,
        ));
        Ok(None)
    }
}
