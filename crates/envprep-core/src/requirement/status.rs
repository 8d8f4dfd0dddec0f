use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::plugin_system::Provider;
use crate::requirement::Requirement;
use crate::storage::LocalStateFile;
use crate::utils::environment::Environment;

/// What a provider found when looking at one requirement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderAnalysis {
    /// Current configuration choices, as strings
    pub config: BTreeMap<String, String>,
    /// Variables that must be set before this requirement can be configured
    pub missing_env_vars_to_configure: BTreeSet<String>,
    /// Variables that must be set before this requirement can be provided
    pub missing_env_vars_to_provide: BTreeSet<String>,
    /// Informational lines produced while analyzing
    pub logs: Vec<String>,
    /// Problems found while analyzing
    pub errors: Vec<String>,
}

/// Point-in-time evaluation of one requirement.
///
/// Statuses are never updated in place; [`RequirementStatus::recheck`]
/// produces a fresh one.
#[derive(Clone)]
pub struct RequirementStatus {
    requirement: Arc<dyn Requirement>,
    provider: Arc<dyn Provider>,
    has_been_provided: bool,
    status_description: String,
    analysis: ProviderAnalysis,
}

impl fmt::Debug for RequirementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequirementStatus")
            .field("env_var", &self.requirement.env_var())
            .field("provider", &self.provider.id())
            .field("has_been_provided", &self.has_been_provided)
            .field("status_description", &self.status_description)
            .finish()
    }
}

impl RequirementStatus {
    /// Evaluate a requirement against the environment and local state
    pub fn check(
        requirement: Arc<dyn Requirement>,
        environ: &Environment,
        local_state: &LocalStateFile,
    ) -> Self {
        let provider = requirement.provider();
        let analysis = provider.analyze(requirement.as_ref(), environ, local_state);
        let why_not = requirement.why_not_provided(environ);
        let has_been_provided = why_not.is_none();
        let status_description = why_not
            .unwrap_or_else(|| format!("Environment variable {} is set.", requirement.env_var()));

        Self {
            requirement,
            provider,
            has_been_provided,
            status_description,
            analysis,
        }
    }

    /// Fresh status for the same requirement
    pub fn recheck(&self, environ: &Environment, local_state: &LocalStateFile) -> Self {
        Self::check(Arc::clone(&self.requirement), environ, local_state)
    }

    pub fn requirement(&self) -> &Arc<dyn Requirement> {
        &self.requirement
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Identity of the requirement within one preparation run
    pub fn env_var(&self) -> &str {
        self.requirement.env_var()
    }

    /// Whether the requirement is currently met
    pub fn has_been_provided(&self) -> bool {
        self.has_been_provided
    }

    /// Same as [`has_been_provided`](Self::has_been_provided); a status is
    /// "truthy" exactly when it is satisfied.
    pub fn is_satisfied(&self) -> bool {
        self.has_been_provided
    }

    /// Human-readable explanation of the status
    pub fn status_description(&self) -> &str {
        &self.status_description
    }

    pub fn analysis(&self) -> &ProviderAnalysis {
        &self.analysis
    }

    pub fn logs(&self) -> &[String] {
        &self.analysis.logs
    }

    pub fn errors(&self) -> &[String] {
        &self.analysis.errors
    }
}

/// Replace entries of `old` with their rechecked counterparts.
///
/// The result has the same length and order as `old`. Entries with no match
/// in `rechecked` are kept as they were, and entries of `rechecked` that do
/// not appear in `old` are ignored.
pub fn refresh_status_list(
    old: &[RequirementStatus],
    rechecked: &[RequirementStatus],
) -> Vec<RequirementStatus> {
    let by_env_var: HashMap<&str, &RequirementStatus> = rechecked
        .iter()
        .map(|status| (status.env_var(), status))
        .collect();

    old.iter()
        .map(|status| {
            by_env_var
                .get(status.env_var())
                .map_or_else(|| status.clone(), |fresh| (*fresh).clone())
        })
        .collect()
}
