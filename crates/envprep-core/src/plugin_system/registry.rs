use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::kernel::error::Result;
use crate::plugin_system::env_var::EnvVarProvider;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::traits::Provider;
use crate::requirement::{EnvVarRequirement, Requirement, RequirementOptions};

/// Builds the requirement for one specific variable
pub type RequirementFactory = Box<
    dyn Fn(&PluginRegistry, &str, RequirementOptions) -> Result<Arc<dyn Requirement>> + Send + Sync,
>;

/// Registry of providers and per-variable requirement factories.
///
/// Providers are looked up by id when a requirement is constructed, so an
/// unknown id fails early instead of in the middle of a preparation run.
pub struct PluginRegistry {
    /// Registered providers, keyed by id
    providers: HashMap<String, Arc<dyn Provider>>,
    /// Requirement factories, keyed by variable name
    requirement_factories: HashMap<String, RequirementFactory>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut factories: Vec<&String> = self.requirement_factories.keys().collect();
        factories.sort();
        f.debug_struct("PluginRegistry")
            .field("providers", &self.provider_ids())
            .field("requirement_factories", &factories)
            .finish()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    /// Create a registry holding the built-in providers
    pub fn new() -> Self {
        let mut registry = Self::empty();
        let env_var: Arc<dyn Provider> = Arc::new(EnvVarProvider::new());
        registry
            .providers
            .insert(env_var.id().to_string(), env_var);
        registry
    }

    /// Create a registry with nothing registered
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
            requirement_factories: HashMap::new(),
        }
    }

    /// Register a provider under its id
    pub fn register_provider(&mut self, provider: Arc<dyn Provider>) -> Result<()> {
        let id = provider.id().to_string();
        if self.providers.contains_key(&id) {
            return Err(PluginSystemError::ProviderAlreadyRegistered { provider_id: id }.into());
        }
        log::debug!("Registered provider '{}'", id);
        self.providers.insert(id, provider);
        Ok(())
    }

    /// Look up a provider by id
    pub fn provider(&self, id: &str) -> Result<Arc<dyn Provider>> {
        self.providers.get(id).cloned().ok_or_else(|| {
            PluginSystemError::ProviderNotFound {
                provider_id: id.to_string(),
            }
            .into()
        })
    }

    pub fn has_provider(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    /// Registered provider ids, sorted
    pub fn provider_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Use `factory` whenever a requirement for `env_var` has to be created
    pub fn register_requirement_factory<F>(&mut self, env_var: impl Into<String>, factory: F)
    where
        F: Fn(&PluginRegistry, &str, RequirementOptions) -> Result<Arc<dyn Requirement>>
            + Send
            + Sync
            + 'static,
    {
        self.requirement_factories
            .insert(env_var.into(), Box::new(factory));
    }

    /// Create the requirement for a variable: the registered factory if
    /// there is one, otherwise a plain [`EnvVarRequirement`].
    pub fn find_requirement_by_env_var(
        &self,
        env_var: &str,
        options: RequirementOptions,
    ) -> Result<Arc<dyn Requirement>> {
        if let Some(factory) = self.requirement_factories.get(env_var) {
            return factory(self, env_var, options).map_err(|e| {
                PluginSystemError::RequirementFactoryFailed {
                    env_var: env_var.to_string(),
                    message: e.to_string(),
                }
                .into()
            });
        }
        Ok(Arc::new(EnvVarRequirement::new(self, env_var, options)?))
    }
}
