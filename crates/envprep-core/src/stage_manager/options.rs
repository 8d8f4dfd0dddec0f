use std::collections::BTreeSet;

use crate::kernel::error::Result;
use crate::plugin_system::ProvideMode;
use crate::utils::verbose::VerboseLogger;

/// Knobs for one preparation run
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    /// Passed through to every provider
    pub mode: ProvideMode,
    /// On failure, return a fresh set-up stage instead of finishing
    pub keep_going_until_success: bool,
    /// When set, only requirements for these variables are provided
    pub provide_whitelist: Option<BTreeSet<String>>,
    /// Appended to the default command's arguments
    pub extra_command_args: Vec<String>,
    /// Verbose output sink shared with providers
    pub verbose: VerboseLogger,
}

impl PrepareOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: ProvideMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the mode from its string form, rejecting unknown values
    pub fn with_mode_str(mut self, mode: &str) -> Result<Self> {
        self.mode = mode.parse()?;
        Ok(self)
    }

    pub fn with_keep_going_until_success(mut self, keep_going: bool) -> Self {
        self.keep_going_until_success = keep_going;
        self
    }

    pub fn with_provide_whitelist<I, S>(mut self, env_vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provide_whitelist = Some(env_vars.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_extra_command_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_command_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_verbose(mut self, verbose: VerboseLogger) -> Self {
        self.verbose = verbose;
        self
    }

    /// Whether `env_var` may be provided under the whitelist
    pub fn may_provide(&self, env_var: &str) -> bool {
        self.provide_whitelist
            .as_ref()
            .is_none_or(|whitelist| whitelist.contains(env_var))
    }
}
