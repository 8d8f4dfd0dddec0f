#![cfg(test)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use crate::kernel::error::{Error, Result};
use crate::plugin_system::{PluginRegistry, ProvideContext, Provider};
use crate::project::{CommandSpec, Project};
use crate::requirement::{EnvVarRequirement, Requirement, RequirementOptions};
use crate::storage::LocalStateFile;
use crate::utils::environment::Environment;

/// Order in which requirements were provided, shared between providers
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Configurable provider for exercising the pipeline.
///
/// Reports the configured dependency variables as missing until they are
/// set, and sets the requirement's variable to `value` starting with the
/// `succeed_on_call`-th provide call.
pub struct TestProvider {
    id: String,
    configure_deps: BTreeSet<String>,
    provide_deps: BTreeSet<String>,
    value: String,
    succeed_on_call: usize,
    calls: AtomicUsize,
    call_log: Option<CallLog>,
    provide_error: Option<String>,
    configure_error: Option<String>,
}

impl TestProvider {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            configure_deps: BTreeSet::new(),
            provide_deps: BTreeSet::new(),
            value: format!("provided-by-{}", id),
            succeed_on_call: 1,
            calls: AtomicUsize::new(0),
            call_log: None,
            provide_error: None,
            configure_error: None,
        }
    }

    pub fn needs_to_configure(mut self, env_vars: &[&str]) -> Self {
        self.configure_deps = env_vars.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn needs_to_provide(mut self, env_vars: &[&str]) -> Self {
        self.provide_deps = env_vars.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn succeed_on_call(mut self, call: usize) -> Self {
        self.succeed_on_call = call;
        self
    }

    pub fn never_succeeds(self) -> Self {
        self.succeed_on_call(usize::MAX)
    }

    pub fn with_call_log(mut self, call_log: CallLog) -> Self {
        self.call_log = Some(call_log);
        self
    }

    /// Return `Err(message)` from every provide call
    pub fn provide_fails_with(mut self, message: &str) -> Self {
        self.provide_error = Some(message.to_string());
        self
    }

    /// Return `Err(message)` whenever configuration is stored
    pub fn configure_fails_with(mut self, message: &str) -> Self {
        self.configure_error = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn unset(deps: &BTreeSet<String>, environ: &Environment) -> BTreeSet<String> {
        deps.iter()
            .filter(|dep| !environ.is_set(dep))
            .cloned()
            .collect()
    }
}

impl Provider for TestProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        "Test provider"
    }

    fn missing_env_vars_to_configure(
        &self,
        _requirement: &dyn Requirement,
        environ: &Environment,
        _local_state: &LocalStateFile,
    ) -> BTreeSet<String> {
        Self::unset(&self.configure_deps, environ)
    }

    fn missing_env_vars_to_provide(
        &self,
        _requirement: &dyn Requirement,
        environ: &Environment,
        _local_state: &LocalStateFile,
    ) -> BTreeSet<String> {
        Self::unset(&self.provide_deps, environ)
    }

    fn set_config_values_as_strings(
        &self,
        _requirement: &dyn Requirement,
        _environ: &Environment,
        _local_state: &mut LocalStateFile,
        _values: &BTreeMap<String, String>,
    ) -> Result<()> {
        match &self.configure_error {
            Some(message) => Err(Error::Other(message.clone())),
            None => Ok(()),
        }
    }

    fn provide(&self, requirement: &dyn Requirement, context: &mut ProvideContext<'_>) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(call_log) = &self.call_log {
            call_log.lock().unwrap().push(requirement.env_var().to_string());
        }
        if let Some(message) = &self.provide_error {
            return Err(Error::Other(message.clone()));
        }

        let missing = Self::unset(&self.provide_deps, context.environ());
        if !missing.is_empty() {
            let missing: Vec<String> = missing.into_iter().collect();
            context.append_error(format!("{} needs {}", self.id, missing.join(", ")));
            return Ok(());
        }

        if call >= self.succeed_on_call {
            context.append_log(format!("{} provided {}", self.id, requirement.env_var()));
            context.environ_mut().set(requirement.env_var(), self.value.clone());
        } else {
            context.append_error(format!("{} is not ready yet (attempt {})", self.id, call));
        }
        Ok(())
    }
}

/// Starting environment with the mandatory `PATH`
pub fn base_environ() -> BTreeMap<String, String> {
    BTreeMap::from([("PATH".to_string(), "/usr/bin:/bin".to_string())])
}

pub fn environ_with(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    let mut environ = base_environ();
    for (key, value) in pairs {
        environ.insert(key.to_string(), value.to_string());
    }
    environ
}

/// Registry holding the built-in providers plus `providers`
pub fn registry_with(providers: Vec<Arc<dyn Provider>>) -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    for provider in providers {
        registry
            .register_provider(provider)
            .expect("test providers have unique ids");
    }
    registry
}

/// Requirement for `env_var` served by the provider registered as `provider_id`
pub fn requirement_for(registry: &PluginRegistry, env_var: &str, provider_id: &str) -> Arc<dyn Requirement> {
    Arc::new(
        EnvVarRequirement::new(
            registry,
            env_var,
            RequirementOptions::new().with("provider", provider_id),
        )
        .expect("provider is registered"),
    )
}

/// Project in `dir` declaring `env_vars`, each served by its paired provider id
pub fn project_with(dir: &Path, registry: PluginRegistry, env_vars: &[(&str, &str)]) -> Arc<Project> {
    let registry = Arc::new(registry);
    let mut builder = Project::builder(dir)
        .name("test-project")
        .plugin_registry(Arc::clone(&registry))
        .command(CommandSpec::new("default", ["python", "main.py"]));
    for (env_var, provider_id) in env_vars {
        builder = builder.requirement(requirement_for(&registry, env_var, provider_id));
    }
    Arc::new(builder.build())
}

pub fn project_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}
