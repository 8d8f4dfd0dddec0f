use std::collections::BTreeMap;

use crate::kernel::constants::DEFAULT_PROVIDER_ID;
use crate::kernel::error::Result;
use crate::plugin_system::context::{ProvideContext, ProvideMode};
use crate::plugin_system::traits::Provider;
use crate::requirement::Requirement;
use crate::storage::LocalStateFile;
use crate::utils::environment::Environment;

/// Config key holding a user-entered value
pub const VALUE_KEY: &str = "value";
/// Config key describing where the current value comes from
pub const SOURCE_KEY: &str = "source";

/// Supplies plain variables from, in order: the environment itself, values
/// the user configured into local state, and the requirement's `default`
/// option.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvVarProvider;

impl EnvVarProvider {
    pub fn new() -> Self {
        Self
    }

    fn value_from_local_state_or_default(
        requirement: &dyn Requirement,
        local_state: &LocalStateFile,
    ) -> Option<(String, &'static str)> {
        local_state
            .variable(requirement.env_var())
            .filter(|value| !value.is_empty())
            .map(|value| (value.to_string(), "variables"))
            .or_else(|| {
                requirement
                    .default_value()
                    .filter(|value| !value.is_empty())
                    .map(|value| (value, "default"))
            })
    }
}

impl Provider for EnvVarProvider {
    fn id(&self) -> &str {
        DEFAULT_PROVIDER_ID
    }

    fn title(&self) -> &str {
        "Environment variable"
    }

    fn read_config(
        &self,
        requirement: &dyn Requirement,
        environ: &Environment,
        local_state: &LocalStateFile,
    ) -> BTreeMap<String, String> {
        let mut config = BTreeMap::new();
        if let Some(value) = local_state.variable(requirement.env_var()) {
            config.insert(VALUE_KEY.to_string(), value.to_string());
        }

        let source = if environ.is_set(requirement.env_var()) {
            "environ"
        } else {
            Self::value_from_local_state_or_default(requirement, local_state)
                .map_or("unset", |(_, source)| source)
        };
        config.insert(SOURCE_KEY.to_string(), source.to_string());
        config
    }

    fn set_config_values_as_strings(
        &self,
        requirement: &dyn Requirement,
        _environ: &Environment,
        local_state: &mut LocalStateFile,
        values: &BTreeMap<String, String>,
    ) -> Result<()> {
        let Some(value) = values.get(VALUE_KEY) else {
            return Ok(());
        };

        if value.is_empty() {
            local_state.unset_variable(requirement.env_var());
        } else {
            local_state.set_variable(requirement.env_var(), value.clone());
        }

        if local_state.is_dirty() {
            local_state.save()?;
        }
        Ok(())
    }

    fn provide(&self, requirement: &dyn Requirement, context: &mut ProvideContext<'_>) -> Result<()> {
        let env_var = requirement.env_var();
        if context.environ().is_set(env_var) {
            return Ok(());
        }

        let Some((value, source)) =
            Self::value_from_local_state_or_default(requirement, context.local_state())
        else {
            context
                .verbose()
                .debug(&format!("No value available for {}", env_var));
            return Ok(());
        };

        let shown = if requirement.encrypted() {
            "<hidden>"
        } else {
            value.as_str()
        };

        if context.mode() == ProvideMode::Check {
            context.verbose().debug(&format!(
                "Check mode: would set {} to {} from {}",
                env_var, shown, source
            ));
            return Ok(());
        }

        context
            .verbose()
            .info(&format!("Setting {} to {} from {}", env_var, shown, source));
        context.environ_mut().set(env_var, value);
        Ok(())
    }
}
