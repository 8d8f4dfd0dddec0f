use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::kernel::constants::{LOCAL_STATE_DIR_NAME, LOCAL_STATE_FILE_NAME};
use crate::kernel::error::{Error, Result};
use crate::storage::error::StorageSystemError;

/// Bookkeeping for one service a provider started for this project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceRunState {
    /// Commands (argv lists) that stop the service, run in order by `unprepare`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shutdown_commands: Vec<Vec<String>>,

    /// Anything else the provider wants to remember (ports, pids, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ServiceRunState {
    /// Create an empty run state
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a shutdown command
    pub fn with_shutdown_command<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shutdown_commands
            .push(argv.into_iter().map(Into::into).collect());
        self
    }

    /// Whether nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.shutdown_commands.is_empty() && self.extra.is_empty()
    }
}

/// On-disk layout of the local state file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct LocalStateData {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    variables: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    service_run_states: BTreeMap<String, ServiceRunState>,
}

/// Per-project persisted state: user-configured variable values and
/// running-service bookkeeping.
///
/// Loaded once per preparation attempt. Nothing is written until the
/// component that changed it calls [`LocalStateFile::save`].
#[derive(Debug, Clone)]
pub struct LocalStateFile {
    path: PathBuf,
    data: LocalStateData,
    dirty: bool,
}

impl LocalStateFile {
    /// Load the local state belonging to a project directory.
    /// A missing file yields empty state.
    pub fn load_for_directory(directory: &Path) -> Result<Self> {
        Self::load(
            directory
                .join(LOCAL_STATE_DIR_NAME)
                .join(LOCAL_STATE_FILE_NAME),
        )
    }

    /// Load local state from an explicit file path
    pub fn load(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            log::debug!("No local state at {}, starting empty", path.display());
            return Ok(Self::empty(path));
        }

        let contents =
            fs::read_to_string(&path).map_err(|e| Error::io(e, "read_local_state", path.clone()))?;
        if contents.trim().is_empty() {
            return Ok(Self::empty(path));
        }

        let data = serde_yaml::from_str(&contents).map_err(|source| {
            StorageSystemError::DeserializationError {
                path: path.clone(),
                source,
            }
        })?;

        Ok(Self {
            path,
            data,
            dirty: false,
        })
    }

    /// Create empty state that will be saved to `path`
    pub fn empty(path: PathBuf) -> Self {
        Self {
            path,
            data: LocalStateData::default(),
            dirty: false,
        }
    }

    /// File this state is saved to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether there are unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Get a user-configured variable value
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.data.variables.get(name).map(String::as_str)
    }

    /// Remember a user-configured variable value
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.data.variables.insert(name.into(), value.into());
        self.dirty = true;
    }

    /// Forget a user-configured variable value
    pub fn unset_variable(&mut self, name: &str) -> Option<String> {
        let removed = self.data.variables.remove(name);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Run state recorded for one service (empty if none)
    pub fn get_service_run_state(&self, service_name: &str) -> ServiceRunState {
        self.data
            .service_run_states
            .get(service_name)
            .cloned()
            .unwrap_or_default()
    }

    /// All recorded service run states, keyed by service name
    pub fn get_all_service_run_states(&self) -> &BTreeMap<String, ServiceRunState> {
        &self.data.service_run_states
    }

    /// Record a service's run state; an empty state clears the record
    pub fn set_service_run_state(&mut self, service_name: impl Into<String>, state: ServiceRunState) {
        let service_name = service_name.into();
        if state.is_empty() {
            self.data.service_run_states.remove(&service_name);
        } else {
            self.data.service_run_states.insert(service_name, state);
        }
        self.dirty = true;
    }

    /// Write the state to disk, atomically replacing the previous file
    pub fn save(&mut self) -> Result<()> {
        let contents = serde_yaml::to_string(&self.data).map_err(|source| {
            StorageSystemError::SerializationError {
                path: self.path.clone(),
                source,
            }
        })?;

        let parent = self
            .path
            .parent()
            .ok_or_else(|| StorageSystemError::OperationFailed {
                operation: "save_local_state".to_string(),
                path: self.path.clone(),
                message: "Cannot write to path without parent directory".to_string(),
            })?;
        fs::create_dir_all(parent).map_err(|e| Error::io(e, "create_dir_all", parent.to_path_buf()))?;

        // Write next to the target so the final rename stays on one filesystem
        let mut temp_file = NamedTempFile::new_in(parent)
            .map_err(|e| Error::io(e, "create_temp_file", parent.to_path_buf()))?;
        temp_file
            .write_all(contents.as_bytes())
            .map_err(|e| Error::io(e, "write_to_temp_file", temp_file.path().to_path_buf()))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| Error::io(e.error, "persist_temp_file", self.path.clone()))?;

        log::debug!("Saved local state to {}", self.path.display());
        self.dirty = false;
        Ok(())
    }
}
