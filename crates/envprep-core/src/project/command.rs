use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::kernel::error::Result;
use crate::stage_manager::error::PrepareSystemError;

/// A named command a project can run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    /// Program followed by its arguments
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CommandSpec {
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Everything needed to launch a project command in a prepared environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandExecInfo {
    pub command_name: String,
    pub cwd: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl CommandExecInfo {
    /// Build a process command that runs with exactly `env`, nothing inherited
    pub fn to_command(&self) -> Result<Command> {
        let (program, args) =
            self.args
                .split_first()
                .ok_or_else(|| PrepareSystemError::EmptyCommand {
                    command_name: self.command_name.clone(),
                })?;

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(&self.cwd)
            .env_clear()
            .envs(&self.env);
        Ok(command)
    }
}
