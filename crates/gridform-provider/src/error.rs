//! Provider error types

use gridform_cloud::CloudError;
use gridform_platform::PlatformError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Attribute '{0}' cannot be changed after creation")]
    Immutable(String),

    #[error("Unknown resource kind: {0}")]
    UnknownKind(String),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("State error: {0}")]
    State(#[from] CloudError),
}

impl ProviderError {
    pub fn validation(message: impl Into<String>) -> Self {
        ProviderError::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
