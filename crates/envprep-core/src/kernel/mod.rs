//! # Envprep Core Kernel
//!
//! Crate-wide error type and constants shared by every subsystem.
//!
//! - **Error Handling**: [`Error`](error::Error) aggregates the typed errors of
//!   the stage manager, plugin system and storage subsystems, with a
//!   [`Result`](error::Result) alias used throughout the crate.
//! - **Constants**: well-known variable names, local state file locations and
//!   safety bounds live in the `constants` submodule.
pub mod constants;
pub mod error;

pub use error::{Error, Result};
