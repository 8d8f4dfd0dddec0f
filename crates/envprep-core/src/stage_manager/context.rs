use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::kernel::error::Result;
use crate::plugin_system::error::PluginSystemError;
use crate::requirement::RequirementStatus;
use crate::storage::LocalStateFile;
use crate::utils::environment::Environment;

/// Shared mutable state of one preparation run.
///
/// Every stage of a run sees the same environment and local state; stages
/// execute one at a time, so the locks are never contended.
#[derive(Clone)]
pub(crate) struct SharedState {
    pub(crate) environ: Arc<Mutex<Environment>>,
    pub(crate) local_state: Arc<Mutex<LocalStateFile>>,
}

impl SharedState {
    pub(crate) fn new(environ: Environment, local_state: LocalStateFile) -> Self {
        Self {
            environ: Arc::new(Mutex::new(environ)),
            local_state: Arc::new(Mutex::new(local_state)),
        }
    }

    pub(crate) fn environ(&self) -> MutexGuard<'_, Environment> {
        lock(&self.environ)
    }

    pub(crate) fn local_state(&self) -> MutexGuard<'_, LocalStateFile> {
        lock(&self.local_state)
    }
}

// A poisoned lock only means an earlier stage panicked; the data is still usable
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What a front end needs to let the user configure requirements before
/// the next stage executes.
#[derive(Clone)]
pub struct ConfigurePrepareContext {
    shared: SharedState,
    statuses: Vec<RequirementStatus>,
}

impl fmt::Debug for ConfigurePrepareContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_vars: Vec<&str> = self.statuses.iter().map(RequirementStatus::env_var).collect();
        f.debug_struct("ConfigurePrepareContext")
            .field("statuses", &env_vars)
            .finish()
    }
}

impl ConfigurePrepareContext {
    pub(crate) fn new(shared: SharedState, statuses: Vec<RequirementStatus>) -> Self {
        Self { shared, statuses }
    }

    /// Statuses that can be configured at this point
    pub fn statuses(&self) -> &[RequirementStatus] {
        &self.statuses
    }

    /// Snapshot of the environment as it stands now
    pub fn environ(&self) -> Environment {
        self.shared.environ().clone()
    }

    /// Run `f` with mutable access to the local state.
    ///
    /// The local state stays locked while `f` runs, so `f` must not call
    /// [`read_config`](Self::read_config) or
    /// [`set_config_values`](Self::set_config_values) on this context (or a
    /// clone of it); doing so deadlocks.
    pub fn with_local_state<R>(&self, f: impl FnOnce(&mut LocalStateFile) -> R) -> R {
        let mut local_state = self.shared.local_state();
        f(&mut *local_state)
    }

    /// Current configuration of one requirement, as its provider reports it
    pub fn read_config(&self, status: &RequirementStatus) -> BTreeMap<String, String> {
        let environ = self.shared.environ();
        let local_state = self.shared.local_state();
        status
            .provider()
            .read_config(status.requirement().as_ref(), &environ, &local_state)
    }

    /// Persist configuration values for one requirement through its provider
    pub fn set_config_values(
        &self,
        status: &RequirementStatus,
        values: &BTreeMap<String, String>,
    ) -> Result<()> {
        let environ = self.shared.environ();
        let mut local_state = self.shared.local_state();
        status
            .provider()
            .set_config_values_as_strings(
                status.requirement().as_ref(),
                &environ,
                &mut local_state,
                values,
            )
            .map_err(|e| {
                PluginSystemError::ConfigureFailed {
                    provider_id: status.provider().id().to_string(),
                    env_var: status.env_var().to_string(),
                    message: e.to_string(),
                }
                .into()
            })
    }
}
