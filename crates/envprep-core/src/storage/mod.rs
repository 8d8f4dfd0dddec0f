pub mod error;
pub mod local_state;

/// Re-export key types
pub use error::StorageSystemError;
pub use local_state::{LocalStateFile, ServiceRunState};
