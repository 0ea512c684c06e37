//! Errors raised by the service worker.

use thiserror::Error;

use crate::network::NetworkError;

/// Errors that can occur in service worker operations.
#[derive(Error, Debug)]
pub enum ServiceWorkerError {
    /// An asset from the precache list could not be fetched. Fatal for install.
    #[error("Precache failed for {url}: {reason}")]
    PrecacheFetch { url: String, reason: String },

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Invalid push payload: {0}")]
    PushPayload(#[from] serde_json::Error),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    Config(#[from] nexachat_core::CoreError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ServiceWorkerError {
    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache(message.into())
    }

    /// Create a state error.
    pub fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }

    /// Create a client error.
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client(message.into())
    }
}

/// Result type alias for service worker operations.
pub type Result<T> = std::result::Result<T, ServiceWorkerError>;
