use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::kernel::error::Result;
use crate::plugin_system::context::ProvideContext;
use crate::requirement::{ProviderAnalysis, Requirement};
use crate::storage::LocalStateFile;
use crate::utils::environment::Environment;

/// Configures and provides a class of requirements.
///
/// Configuring persists a user choice about how to satisfy a requirement
/// (into local state); providing performs the side effect that satisfies
/// it (setting a variable, starting a service, installing something).
pub trait Provider: Send + Sync {
    /// Registry id of this provider
    fn id(&self) -> &str;

    /// Human-readable name
    fn title(&self) -> &str;

    /// Variables that must be set before the requirement can be configured
    fn missing_env_vars_to_configure(
        &self,
        _requirement: &dyn Requirement,
        _environ: &Environment,
        _local_state: &LocalStateFile,
    ) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Variables that must be set before the requirement can be provided
    fn missing_env_vars_to_provide(
        &self,
        _requirement: &dyn Requirement,
        _environ: &Environment,
        _local_state: &LocalStateFile,
    ) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Current configuration choices for the requirement, as strings
    fn read_config(
        &self,
        _requirement: &dyn Requirement,
        _environ: &Environment,
        _local_state: &LocalStateFile,
    ) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Persist configuration choices made by the user
    fn set_config_values_as_strings(
        &self,
        _requirement: &dyn Requirement,
        _environ: &Environment,
        _local_state: &mut LocalStateFile,
        _values: &BTreeMap<String, String>,
    ) -> Result<()> {
        Ok(())
    }

    /// Everything the pipeline needs to know about the requirement right now
    fn analyze(
        &self,
        requirement: &dyn Requirement,
        environ: &Environment,
        local_state: &LocalStateFile,
    ) -> ProviderAnalysis {
        ProviderAnalysis {
            config: self.read_config(requirement, environ, local_state),
            missing_env_vars_to_configure: self.missing_env_vars_to_configure(
                requirement,
                environ,
                local_state,
            ),
            missing_env_vars_to_provide: self.missing_env_vars_to_provide(
                requirement,
                environ,
                local_state,
            ),
            logs: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Satisfy the requirement.
    ///
    /// Problems the user should see go into `context.append_error`; an `Err`
    /// is reserved for faults and is turned into an error line by the
    /// pipeline.
    fn provide(&self, requirement: &dyn Requirement, context: &mut ProvideContext<'_>) -> Result<()>;
}

impl fmt::Debug for dyn Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider").field("id", &self.id()).finish()
    }
}
