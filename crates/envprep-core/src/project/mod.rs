//! # Envprep Core Project
//!
//! The project being prepared: where it lives, what it requires, which
//! commands it can run, and any problems found while describing it.
//! Loading projects from a config file happens elsewhere; callers assemble
//! a [`Project`] with [`ProjectBuilder`].
pub mod command;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::kernel::error::Result;
use crate::plugin_system::PluginRegistry;
use crate::requirement::{Requirement, RequirementOptions};
use crate::stage_manager::error::PrepareSystemError;

pub use command::{CommandExecInfo, CommandSpec};

/// A project ready to be handed to the preparation pipeline
pub struct Project {
    name: String,
    directory_path: PathBuf,
    problems: Vec<String>,
    requirements: Vec<Arc<dyn Requirement>>,
    plugin_registry: Arc<PluginRegistry>,
    commands: Vec<CommandSpec>,
    default_command: Option<String>,
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let requirements: Vec<&str> = self.requirements.iter().map(|r| r.env_var()).collect();
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("directory_path", &self.directory_path)
            .field("problems", &self.problems)
            .field("requirements", &requirements)
            .field("commands", &self.commands)
            .field("default_command", &self.default_command)
            .finish()
    }
}

impl Project {
    /// Start building a project rooted at `directory_path`
    pub fn builder(directory_path: impl Into<PathBuf>) -> ProjectBuilder {
        ProjectBuilder::new(directory_path)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory_path(&self) -> &Path {
        &self.directory_path
    }

    /// Problems that keep the project from being prepared; empty when loadable
    pub fn problems(&self) -> &[String] {
        &self.problems
    }

    /// Declared requirements, in declaration order
    pub fn requirements(&self) -> &[Arc<dyn Requirement>] {
        &self.requirements
    }

    pub fn plugin_registry(&self) -> &Arc<PluginRegistry> {
        &self.plugin_registry
    }

    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    pub fn command(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.iter().find(|command| command.name == name)
    }

    /// The explicitly chosen default command, else the first declared one
    pub fn default_command(&self) -> Option<&str> {
        self.default_command
            .as_deref()
            .or_else(|| self.commands.first().map(|command| command.name.as_str()))
    }

    /// How to run the default command in `environ`.
    ///
    /// `None` when the project declares no commands.
    pub fn exec_info_for_environment(
        &self,
        environ: &BTreeMap<String, String>,
        extra_args: &[String],
    ) -> Result<Option<CommandExecInfo>> {
        let Some(command_name) = self.default_command() else {
            return Ok(None);
        };
        let command = self
            .command(command_name)
            .ok_or_else(|| PrepareSystemError::UnknownCommand {
                command_name: command_name.to_string(),
            })?;

        let mut args = command.args.clone();
        args.extend(extra_args.iter().cloned());

        Ok(Some(CommandExecInfo {
            command_name: command.name.clone(),
            cwd: self.directory_path.clone(),
            args,
            env: environ.clone(),
        }))
    }
}

/// Assembles a [`Project`].
///
/// Mistakes in the description (duplicate variables, an unknown default
/// command, a requirement naming an unregistered provider) do not fail the
/// build; they are recorded as project problems.
pub struct ProjectBuilder {
    name: Option<String>,
    directory_path: PathBuf,
    problems: Vec<String>,
    requirements: Vec<Arc<dyn Requirement>>,
    pending_env_vars: Vec<(String, RequirementOptions)>,
    plugin_registry: Option<Arc<PluginRegistry>>,
    commands: Vec<CommandSpec>,
    default_command: Option<String>,
}

impl ProjectBuilder {
    pub fn new(directory_path: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            directory_path: directory_path.into(),
            problems: Vec::new(),
            requirements: Vec::new(),
            pending_env_vars: Vec::new(),
            plugin_registry: None,
            commands: Vec::new(),
            default_command: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Registry used to resolve providers; a default registry otherwise
    pub fn plugin_registry(mut self, registry: Arc<PluginRegistry>) -> Self {
        self.plugin_registry = Some(registry);
        self
    }

    /// Add an already constructed requirement
    pub fn requirement(mut self, requirement: Arc<dyn Requirement>) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Add a requirement for `env_var`, resolved through the registry at build time
    pub fn env_var_requirement(mut self, env_var: impl Into<String>, options: RequirementOptions) -> Self {
        self.pending_env_vars.push((env_var.into(), options));
        self
    }

    pub fn problem(mut self, problem: impl Into<String>) -> Self {
        self.problems.push(problem.into());
        self
    }

    pub fn command(mut self, command: CommandSpec) -> Self {
        self.commands.push(command);
        self
    }

    pub fn default_command(mut self, name: impl Into<String>) -> Self {
        self.default_command = Some(name.into());
        self
    }

    pub fn build(self) -> Project {
        let plugin_registry = self
            .plugin_registry
            .unwrap_or_else(|| Arc::new(PluginRegistry::new()));
        let mut problems = self.problems;
        let mut requirements = self.requirements;

        for (env_var, options) in self.pending_env_vars {
            match plugin_registry.find_requirement_by_env_var(&env_var, options) {
                Ok(requirement) => requirements.push(requirement),
                Err(e) => problems.push(format!("Unable to create requirement for {}: {}", env_var, e)),
            }
        }

        let mut seen = BTreeSet::new();
        requirements.retain(|requirement| {
            let env_var = requirement.env_var().to_string();
            if seen.insert(env_var.clone()) {
                true
            } else {
                problems.push(format!("Requirement {} is declared more than once.", env_var));
                false
            }
        });

        let mut command_names = BTreeSet::new();
        for command in &self.commands {
            if !command_names.insert(command.name.as_str()) {
                problems.push(format!("Command '{}' is declared more than once.", command.name));
            }
            if command.args.is_empty() {
                problems.push(format!("Command '{}' has nothing to run.", command.name));
            }
        }
        if let Some(default_command) = &self.default_command {
            if !command_names.contains(default_command.as_str()) {
                problems.push(format!("Default command '{}' is not defined.", default_command));
            }
        }

        let name = self.name.unwrap_or_else(|| {
            self.directory_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "project".to_string())
        });

        Project {
            name,
            directory_path: self.directory_path,
            problems,
            requirements,
            plugin_registry,
            commands: self.commands,
            default_command: self.default_command,
        }
    }
}
