pub mod options;
pub mod status;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::kernel::constants::{DEFAULT_PROVIDER_ID, ENCRYPTED_SUFFIXES};
use crate::kernel::error::Result;
use crate::plugin_system::{PluginRegistry, Provider};
use crate::storage::LocalStateFile;
use crate::utils::environment::Environment;

pub use options::RequirementOptions;
pub use status::{refresh_status_list, ProviderAnalysis, RequirementStatus};

/// Something a project needs before it can run, identified by the
/// environment variable that ends up holding it.
pub trait Requirement: Send + Sync {
    /// Variable this requirement supplies; unique within one preparation run
    fn env_var(&self) -> &str;

    /// Options from the project config
    fn options(&self) -> &RequirementOptions;

    /// Provider responsible for configuring and providing this requirement
    fn provider(&self) -> Arc<dyn Provider>;

    /// Human-readable name
    fn title(&self) -> String {
        self.options()
            .get_str("description")
            .map(str::to_string)
            .unwrap_or_else(|| self.env_var().to_string())
    }

    /// Whether the value is a secret that must not be shown
    fn encrypted(&self) -> bool {
        guess_encrypted(self.env_var(), self.options())
    }

    /// Value to fall back on when nothing else supplies the variable
    fn default_value(&self) -> Option<String> {
        match self.options().get("default")? {
            Value::String(value) => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            Value::Bool(value) => Some(value.to_string()),
            _ => None,
        }
    }

    /// Why the requirement is not met, or `None` when it is.
    /// An empty value counts as unset.
    fn why_not_provided(&self, environ: &Environment) -> Option<String> {
        if environ.is_set(self.env_var()) {
            None
        } else {
            Some(format!("Environment variable {} is not set.", self.env_var()))
        }
    }
}

/// Status checks on shared requirement handles
pub trait RequirementExt {
    /// Evaluate the requirement now
    fn check_status(&self, environ: &Environment, local_state: &LocalStateFile) -> RequirementStatus;
}

impl RequirementExt for Arc<dyn Requirement> {
    fn check_status(&self, environ: &Environment, local_state: &LocalStateFile) -> RequirementStatus {
        RequirementStatus::check(Arc::clone(self), environ, local_state)
    }
}

impl fmt::Debug for dyn Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requirement")
            .field("env_var", &self.env_var())
            .field("provider", &self.provider().id())
            .finish()
    }
}

/// Explicit `encrypted` option wins; otherwise secrets are guessed from
/// the variable name.
pub fn guess_encrypted(env_var: &str, options: &RequirementOptions) -> bool {
    options
        .get_bool("encrypted")
        .unwrap_or_else(|| ENCRYPTED_SUFFIXES.iter().any(|suffix| env_var.ends_with(suffix)))
}

/// A plain environment-variable requirement
#[derive(Clone)]
pub struct EnvVarRequirement {
    env_var: String,
    options: RequirementOptions,
    provider: Arc<dyn Provider>,
}

impl fmt::Debug for EnvVarRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvVarRequirement")
            .field("env_var", &self.env_var)
            .field("provider", &self.provider.id())
            .finish()
    }
}

impl EnvVarRequirement {
    /// Create a requirement, resolving its provider from the `provider`
    /// option (`env_var` when absent).
    pub fn new(
        registry: &PluginRegistry,
        env_var: impl Into<String>,
        options: RequirementOptions,
    ) -> Result<Self> {
        let provider_id = options.get_str("provider").unwrap_or(DEFAULT_PROVIDER_ID);
        let provider = registry.provider(provider_id)?;
        Ok(Self::with_provider(env_var, options, provider))
    }

    /// Create a requirement with an already resolved provider
    pub fn with_provider(
        env_var: impl Into<String>,
        options: RequirementOptions,
        provider: Arc<dyn Provider>,
    ) -> Self {
        Self {
            env_var: env_var.into(),
            options,
            provider,
        }
    }
}

impl Requirement for EnvVarRequirement {
    fn env_var(&self) -> &str {
        &self.env_var
    }

    fn options(&self) -> &RequirementOptions {
        &self.options
    }

    fn provider(&self) -> Arc<dyn Provider> {
        Arc::clone(&self.provider)
    }
}
