use std::fmt;
use std::sync::Arc;

use crate::kernel::error::Result;
use crate::requirement::RequirementStatus;
use crate::stage_manager::context::ConfigurePrepareContext;
use crate::stage_manager::error::PrepareSystemError;
use crate::stage_manager::result::PrepareResult;
use crate::stage_manager::{PrepareStage, StageStep};

/// Work performed by a [`FunctionStage`].
///
/// Receives the stage so it can record the result with
/// [`FunctionStage::set_result`]; returns the next stage, or `None` once a
/// result has been set.
pub type StageFn =
    Box<dyn FnOnce(&mut FunctionStage) -> Result<Option<Box<dyn PrepareStage>>> + Send>;

/// Computes the follow-up stage from the statuses a finished stage left behind
pub type AndThenFn =
    Arc<dyn Fn(Vec<RequirementStatus>) -> Result<Option<Box<dyn PrepareStage>>> + Send + Sync>;

/// A stage backed by a single-shot function
pub struct FunctionStage {
    description: String,
    statuses_before: Vec<RequirementStatus>,
    statuses_after: Option<Vec<RequirementStatus>>,
    configure_context: Option<ConfigurePrepareContext>,
    execute_fn: Option<StageFn>,
    result: Option<PrepareResult>,
}

impl fmt::Debug for FunctionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionStage")
            .field("description", &self.description)
            .field("executed", &self.execute_fn.is_none())
            .field("result", &self.result)
            .finish()
    }
}

impl FunctionStage {
    pub fn new<F>(description: impl Into<String>, statuses: Vec<RequirementStatus>, execute_fn: F) -> Self
    where
        F: FnOnce(&mut FunctionStage) -> Result<Option<Box<dyn PrepareStage>>> + Send + 'static,
    {
        Self {
            description: description.into(),
            statuses_before: statuses,
            statuses_after: None,
            configure_context: None,
            execute_fn: Some(Box::new(execute_fn)),
            result: None,
        }
    }

    /// Offer `context` to front ends through [`PrepareStage::configure`]
    pub fn with_configure_context(mut self, context: ConfigurePrepareContext) -> Self {
        self.configure_context = Some(context);
        self
    }

    /// Record the outcome; its statuses become the post-execution statuses
    pub fn set_result(&mut self, result: PrepareResult) {
        self.statuses_after = Some(result.statuses().to_vec());
        self.result = Some(result);
    }
}

impl PrepareStage for FunctionStage {
    fn description_of_action(&self) -> &str {
        &self.description
    }

    fn configure(&self) -> Option<ConfigurePrepareContext> {
        self.configure_context.clone()
    }

    fn execute(&mut self) -> Result<StageStep> {
        let execute_fn = self
            .execute_fn
            .take()
            .ok_or_else(|| PrepareSystemError::StageAlreadyExecuted {
                stage: self.description.clone(),
            })?;

        log::debug!("Executing stage '{}'", self.description);
        let next = execute_fn(self)?;

        if self.statuses_after.is_none() {
            self.statuses_after = Some(self.statuses_before.clone());
        }

        match next {
            Some(stage) => Ok(StageStep::Continue(stage)),
            None => {
                let result = self
                    .result
                    .clone()
                    .ok_or_else(|| PrepareSystemError::ResultNotSet {
                        stage: self.description.clone(),
                    })?;
                Ok(StageStep::Done(result))
            }
        }
    }

    fn failed(&self) -> bool {
        self.result.as_ref().is_some_and(PrepareResult::failed)
    }

    fn result(&self) -> Result<&PrepareResult> {
        self.result.as_ref().ok_or_else(|| {
            PrepareSystemError::ResultNotAvailable {
                stage: self.description.clone(),
            }
            .into()
        })
    }

    fn statuses_before_execute(&self) -> &[RequirementStatus] {
        &self.statuses_before
    }

    fn statuses_after_execute(&self) -> Result<&[RequirementStatus]> {
        self.statuses_after.as_deref().ok_or_else(|| {
            PrepareSystemError::StatusesNotAvailable {
                stage: self.description.clone(),
            }
            .into()
        })
    }
}

/// Runs an inner stage to completion, then hands its final statuses to a
/// continuation that decides what comes next.
///
/// Everything but `execute` is answered by the inner stage.
pub struct AndThenStage {
    inner: Box<dyn PrepareStage>,
    and_then: AndThenFn,
}

impl fmt::Debug for AndThenStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AndThenStage")
            .field("inner", &self.inner.description_of_action())
            .finish()
    }
}

impl AndThenStage {
    pub fn new<F>(inner: Box<dyn PrepareStage>, and_then: F) -> Self
    where
        F: Fn(Vec<RequirementStatus>) -> Result<Option<Box<dyn PrepareStage>>> + Send + Sync + 'static,
    {
        Self::with_shared(inner, Arc::new(and_then))
    }

    /// Wrap `inner` with a continuation already shared with other stages
    pub fn with_shared(inner: Box<dyn PrepareStage>, and_then: AndThenFn) -> Self {
        Self { inner, and_then }
    }
}

impl PrepareStage for AndThenStage {
    fn description_of_action(&self) -> &str {
        self.inner.description_of_action()
    }

    fn configure(&self) -> Option<ConfigurePrepareContext> {
        self.inner.configure()
    }

    fn execute(&mut self) -> Result<StageStep> {
        match self.inner.execute()? {
            StageStep::Continue(next_inner) => Ok(StageStep::Continue(Box::new(
                AndThenStage::with_shared(next_inner, Arc::clone(&self.and_then)),
            ))),
            StageStep::Done(result) if result.failed() => Ok(StageStep::Done(result)),
            StageStep::Done(result) => {
                let statuses = self.inner.statuses_after_execute()?.to_vec();
                match (self.and_then)(statuses)? {
                    Some(next) => Ok(StageStep::Continue(next)),
                    None => Ok(StageStep::Done(result)),
                }
            }
        }
    }

    fn failed(&self) -> bool {
        self.inner.failed()
    }

    fn result(&self) -> Result<&PrepareResult> {
        self.inner.result()
    }

    fn statuses_before_execute(&self) -> &[RequirementStatus] {
        self.inner.statuses_before_execute()
    }

    fn statuses_after_execute(&self) -> Result<&[RequirementStatus]> {
        self.inner.statuses_after_execute()
    }
}
