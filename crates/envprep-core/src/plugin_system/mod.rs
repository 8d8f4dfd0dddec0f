//! # Envprep Core Plugin System
//!
//! Providers are the pluggable half of preparation: each one knows how to
//! configure and provide some class of requirement.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`traits`]**: the [`Provider`] trait.
//! - **[`context`]**: [`ProvideContext`], handed to a provider for one
//!   provide call, and the [`ProvideMode`] it runs under.
//! - **[`env_var`]**: [`EnvVarProvider`], the built-in provider for plain
//!   variables.
//! - **[`registry`]**: [`PluginRegistry`], mapping provider ids to
//!   providers and variables to requirement factories.
//! - **[`error`]**: [`PluginSystemError`](error::PluginSystemError).
pub mod context;
pub mod env_var;
pub mod error;
pub mod registry;
pub mod traits;

pub use context::{ProvideContext, ProvideMode};
pub use env_var::EnvVarProvider;
pub use registry::{PluginRegistry, RequirementFactory};
pub use traits::Provider;
