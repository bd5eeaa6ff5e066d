//! Worker error type.

use splitfriend_common::SplitFriendError;
use thiserror::Error;

/// Errors that can occur in service worker operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceWorkerError {
    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Install failed: {0}")]
    InstallFailed(String),

    #[error("Security error: {0}")]
    SecurityError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Notification error: {0}")]
    NotificationError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<ServiceWorkerError> for SplitFriendError {
    fn from(err: ServiceWorkerError) -> Self {
        match err {
            ServiceWorkerError::NetworkError(message) => SplitFriendError::network(message),
            ServiceWorkerError::NotFound(resource) => SplitFriendError::NotFound(resource),
            other => SplitFriendError::worker_with_source("service worker", other),
        }
    }
}
