//! # Envprep Core UI Bridge
//!
//! The boundary to interactive front ends. A front end implements
//! [`PrepareUi`]: it receives the first stage of a run and drives it to a
//! result, showing each stage's configure context to the user between
//! `execute` calls.
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::kernel::error::Result;
use crate::project::Project;
use crate::stage_manager::{
    prepare_in_stages, project_problems_to_prepare_failure, ConfigurePrepareContext, PrepareOptions,
    PrepareResult, PrepareStage, StageStep,
};

/// An interactive front end
pub trait PrepareUi {
    /// Name of the front end, for logging
    fn name(&self) -> &str;

    /// Drive `stage` and its successors to a final result
    fn drive(&mut self, project: &Project, stage: Box<dyn PrepareStage>) -> Result<PrepareResult>;
}

/// Run a stage chain, calling `on_configure` before each stage that has
/// something to configure.
///
/// Front ends that only need a hook between stages can implement
/// [`PrepareUi::drive`] with this.
pub fn drive_stages<F>(stage: Box<dyn PrepareStage>, mut on_configure: F) -> Result<PrepareResult>
where
    F: FnMut(&dyn PrepareStage, &ConfigurePrepareContext) -> Result<()>,
{
    let mut stage = stage;
    loop {
        if let Some(context) = stage.configure() {
            on_configure(stage.as_ref(), &context)?;
        }
        match stage.execute()? {
            StageStep::Continue(next) => stage = next,
            StageStep::Done(result) => return Ok(result),
        }
    }
}

/// Prepare `project` through an interactive front end.
///
/// Project problems come back as a failed result without the front end
/// being involved.
pub fn prepare_with_ui(
    project: Arc<Project>,
    environ: &BTreeMap<String, String>,
    ui: &mut dyn PrepareUi,
    options: PrepareOptions,
) -> Result<PrepareResult> {
    if let Some(failure) = project_problems_to_prepare_failure(&project) {
        return Ok(failure);
    }

    let stage = prepare_in_stages(Arc::clone(&project), environ, options)?;
    log::debug!("Handing preparation of '{}' to front end '{}'", project.name(), ui.name());
    ui.drive(&project, stage)
}
