//! # Envprep Core Plugin System Errors
//!
//! Defines [`PluginSystemError`], raised by the provider registry and by
//! providers themselves when something other than an unmet requirement goes
//! wrong (an unregistered provider id, a duplicate registration, a provider
//! that could not persist its configuration).
#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("No provider registered with id '{provider_id}'")]
    ProviderNotFound { provider_id: String },

    #[error("Provider '{provider_id}' is already registered")]
    ProviderAlreadyRegistered { provider_id: String },

    #[error("Provider '{provider_id}' failed to configure '{env_var}': {message}")]
    ConfigureFailed {
        provider_id: String,
        env_var: String,
        message: String,
    },

    #[error("Provider '{provider_id}' failed to provide '{env_var}': {message}")]
    ProvideFailed {
        provider_id: String,
        env_var: String,
        message: String,
    },

    #[error("Requirement factory for '{env_var}' failed: {message}")]
    RequirementFactoryFailed { env_var: String, message: String },
}
