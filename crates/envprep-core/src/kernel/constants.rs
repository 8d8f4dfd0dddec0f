/// Variable injected into every prepared environment, pointing at the project directory
pub const PROJECT_DIR_VAR: &str = "PROJECT_DIR";

/// Variable that must be present in the starting environment
pub const PATH_VAR: &str = "PATH";

/// Directory (relative to the project) holding per-project local state
pub const LOCAL_STATE_DIR_NAME: &str = ".envprep";

/// Local state file name inside [`LOCAL_STATE_DIR_NAME`]
pub const LOCAL_STATE_FILE_NAME: &str = "local-state.yml";

/// Provider id used when a requirement names no provider
pub const DEFAULT_PROVIDER_ID: &str = "env_var";

/// Description of the stage that configures and provides a group of requirements
pub const SET_UP_STAGE_DESCRIPTION: &str = "Set up project.";

/// Upper bound on rounds of transitive requirement discovery.
/// Hitting it means some provider keeps inventing new variables.
pub const MAX_REQUIREMENT_DISCOVERY_ROUNDS: usize = 64;

/// Variable name suffixes that mark a requirement as holding a secret
pub const ENCRYPTED_SUFFIXES: &[&str] = &["_PASSWORD", "_SECRET", "_SECRET_KEY", "_ENCRYPTED"];
