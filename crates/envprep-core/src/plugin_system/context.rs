use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::requirement::RequirementStatus;
use crate::stage_manager::error::PrepareSystemError;
use crate::storage::LocalStateFile;
use crate::utils::environment::Environment;
use crate::utils::verbose::VerboseLogger;

/// What providers are allowed to do while providing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvideMode {
    /// Set things up for deployment
    Production,
    /// Set things up for local development
    #[default]
    Development,
    /// Only check; never change anything
    Check,
}

impl ProvideMode {
    /// All recognized modes
    pub const ALL: [ProvideMode; 3] = [
        ProvideMode::Production,
        ProvideMode::Development,
        ProvideMode::Check,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProvideMode::Production => "production",
            ProvideMode::Development => "development",
            ProvideMode::Check => "check",
        }
    }
}

impl fmt::Display for ProvideMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvideMode {
    type Err = PrepareSystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| PrepareSystemError::InvalidProvideMode {
                mode: s.to_string(),
            })
    }
}

/// State handed to one `Provider::provide` call.
///
/// Borrows the run's environment and local state mutably for the duration
/// of the call and collects the log and error lines the provider produces.
pub struct ProvideContext<'a> {
    environ: &'a mut Environment,
    local_state: &'a mut LocalStateFile,
    status: &'a RequirementStatus,
    mode: ProvideMode,
    verbose: VerboseLogger,
    logs: Vec<String>,
    errors: Vec<String>,
}

impl fmt::Debug for ProvideContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvideContext")
            .field("env_var", &self.status.env_var())
            .field("mode", &self.mode)
            .field("logs", &self.logs)
            .field("errors", &self.errors)
            .finish()
    }
}

impl<'a> ProvideContext<'a> {
    pub fn new(
        environ: &'a mut Environment,
        local_state: &'a mut LocalStateFile,
        status: &'a RequirementStatus,
        mode: ProvideMode,
        verbose: VerboseLogger,
    ) -> Self {
        Self {
            environ,
            local_state,
            status,
            mode,
            verbose,
            logs: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn environ(&self) -> &Environment {
        self.environ
    }

    pub fn environ_mut(&mut self) -> &mut Environment {
        self.environ
    }

    pub fn local_state(&self) -> &LocalStateFile {
        self.local_state
    }

    pub fn local_state_mut(&mut self) -> &mut LocalStateFile {
        self.local_state
    }

    /// Status of the requirement being provided, as of just before the call
    pub fn status(&self) -> &RequirementStatus {
        self.status
    }

    pub fn mode(&self) -> ProvideMode {
        self.mode
    }

    pub fn verbose(&self) -> &VerboseLogger {
        &self.verbose
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Record an informational line for the user
    pub fn append_log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }

    /// Record a failure diagnostic for the user
    pub fn append_error(&mut self, line: impl Into<String>) {
        self.errors.push(line.into());
    }

    /// Consume the context, returning the collected logs and errors
    pub fn into_output(self) -> (Vec<String>, Vec<String>) {
        (self.logs, self.errors)
    }
}
