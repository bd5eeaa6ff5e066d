//! # SplitFriend Common
//!
//! Shared error type and logging setup for the SplitFriend client crates.
//!
//! ## Features
//!
//! - Unified error type with categories and backtrace support
//! - Logging configuration and setup
//! - `ResultExt::context` for wrapping foreign errors

use thiserror::Error;

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};

/// Unified error type for SplitFriend.
#[derive(Error, Debug)]
pub enum SplitFriendError {
    /// Network-related errors.
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Local storage errors.
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Service worker errors.
    #[error("Worker error: {message}")]
    Worker {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        backtrace: Option<backtrace::Backtrace>,
    },
}

impl SplitFriendError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source.
    pub fn network_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a storage error with source.
    pub fn storage_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a worker error with source.
    pub fn worker_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Worker {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error with backtrace.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            backtrace: Some(backtrace::Backtrace::new()),
        }
    }

    /// Get the error category for log fields.
    pub fn category(&self) -> &'static str {
        match self {
            SplitFriendError::Network { .. } => "network",
            SplitFriendError::Storage { .. } => "storage",
            SplitFriendError::Worker { .. } => "worker",
            SplitFriendError::Io(_) => "io",
            SplitFriendError::NotFound(_) => "not_found",
            SplitFriendError::InvalidArgument(_) => "invalid_argument",
            SplitFriendError::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for SplitFriend operations.
pub type Result<T> = std::result::Result<T, SplitFriendError>;

/// Extension trait for Result.
pub trait ResultExt<T> {
    /// Wrap an unexpected error as [`SplitFriendError::Internal`].
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| SplitFriendError::internal(format!("{}: {}", message.into(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(SplitFriendError::network("test").category(), "network");
        assert_eq!(
            SplitFriendError::storage_with_source("test", std::io::Error::other("disk")).category(),
            "storage"
        );
        assert_eq!(
            SplitFriendError::NotFound("x".to_string()).category(),
            "not_found"
        );
    }

    #[test]
    fn test_context_wraps_source_message() {
        let parsed: std::result::Result<u32, std::num::ParseIntError> = "abc".parse::<u32>();
        let err = parsed.context("reading count").unwrap_err();
        assert_eq!(err.category(), "internal");
        assert!(err.to_string().contains("reading count"));
    }

    #[test]
    fn test_internal_captures_backtrace() {
        match SplitFriendError::internal("boom") {
            SplitFriendError::Internal { message, backtrace } => {
                assert_eq!(message, "boom");
                assert!(backtrace.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
