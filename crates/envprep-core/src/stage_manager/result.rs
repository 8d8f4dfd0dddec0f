use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::project::CommandExecInfo;
use crate::requirement::RequirementStatus;
use crate::utils::environment::update_environ;

/// Outcome of a successful preparation
#[derive(Debug, Clone)]
pub struct PrepareSuccess {
    pub logs: Vec<String>,
    pub statuses: Vec<RequirementStatus>,
    /// How to run the project's default command; `None` if it has none
    pub command_exec_info: Option<CommandExecInfo>,
    /// The prepared environment
    pub environ: BTreeMap<String, String>,
}

/// Outcome of a failed preparation
#[derive(Debug, Clone)]
pub struct PrepareFailure {
    pub logs: Vec<String>,
    pub statuses: Vec<RequirementStatus>,
    pub errors: Vec<String>,
}

/// Terminal result of a preparation stage
#[derive(Debug, Clone)]
pub enum PrepareResult {
    Success(PrepareSuccess),
    Failure(PrepareFailure),
}

impl PrepareResult {
    pub fn success(
        logs: Vec<String>,
        statuses: Vec<RequirementStatus>,
        command_exec_info: Option<CommandExecInfo>,
        environ: BTreeMap<String, String>,
    ) -> Self {
        PrepareResult::Success(PrepareSuccess {
            logs,
            statuses,
            command_exec_info,
            environ,
        })
    }

    pub fn failure(logs: Vec<String>, statuses: Vec<RequirementStatus>, errors: Vec<String>) -> Self {
        PrepareResult::Failure(PrepareFailure {
            logs,
            statuses,
            errors,
        })
    }

    pub fn failed(&self) -> bool {
        matches!(self, PrepareResult::Failure(_))
    }

    pub fn is_success(&self) -> bool {
        !self.failed()
    }

    /// Informational lines, meant for stdout
    pub fn logs(&self) -> &[String] {
        match self {
            PrepareResult::Success(success) => &success.logs,
            PrepareResult::Failure(failure) => &failure.logs,
        }
    }

    /// Failure diagnostics, meant for stderr; always empty on success
    pub fn errors(&self) -> &[String] {
        match self {
            PrepareResult::Success(_) => &[],
            PrepareResult::Failure(failure) => &failure.errors,
        }
    }

    /// Final status of every requirement
    pub fn statuses(&self) -> &[RequirementStatus] {
        match self {
            PrepareResult::Success(success) => &success.statuses,
            PrepareResult::Failure(failure) => &failure.statuses,
        }
    }

    /// Status of the requirement for `env_var`, if the project has one
    pub fn status_for_env_var(&self, env_var: &str) -> Option<&RequirementStatus> {
        self.statuses()
            .iter()
            .find(|status| status.env_var() == env_var)
    }

    /// The prepared environment; `None` on failure
    pub fn environ(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            PrepareResult::Success(success) => Some(&success.environ),
            PrepareResult::Failure(_) => None,
        }
    }

    pub fn command_exec_info(&self) -> Option<&CommandExecInfo> {
        match self {
            PrepareResult::Success(success) => success.command_exec_info.as_ref(),
            PrepareResult::Failure(_) => None,
        }
    }

    /// Copy added or changed variables into `dest`, never removing any.
    /// Does nothing on failure. Returns how many keys were written.
    pub fn update_environ(&self, dest: &mut BTreeMap<String, String>) -> usize {
        self.environ()
            .map_or(0, |environ| update_environ(dest, environ))
    }

    /// Write logs to `out` and errors to `err`, one line each
    pub fn write_output(&self, out: &mut dyn Write, err: &mut dyn Write) -> io::Result<()> {
        for line in self.logs() {
            writeln!(out, "{}", line)?;
        }
        for line in self.errors() {
            writeln!(err, "{}", line)?;
        }
        Ok(())
    }

    /// Write logs to stdout and errors to stderr
    pub fn print_output(&self) -> io::Result<()> {
        let stdout = io::stdout();
        let stderr = io::stderr();
        self.write_output(&mut stdout.lock(), &mut stderr.lock())
    }
}
