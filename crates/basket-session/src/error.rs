//! # Session Error Types
//!
//! Error types for cart sessions and their collaborators.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Session Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Storage     │  │     Cart                │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Io             │  │  ItemNotFound           │ │
//! │  │  ConfigLoad..   │  │  Serialization  │  │  Validation             │ │
//! │  │  ConfigSave..   │  │  InvalidInstance│  │  BatchRecord            │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use basket_core::CartError;
use thiserror::Error;

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Store Error
// =============================================================================

/// Storage collaborator failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File system failure.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot could not be encoded or decoded.
    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Instance names become file names, so they are restricted.
    #[error("Invalid instance name: '{0}'")]
    InvalidInstanceName(String),
}

// =============================================================================
// Session Error
// =============================================================================

/// What callers of a cart session see.
#[derive(Debug, Error)]
pub enum SessionError {
    // =========================================================================
    // Cart Errors
    // =========================================================================
    /// A cart operation was rejected. Nothing was persisted.
    #[error(transparent)]
    Cart(#[from] CartError),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// The storage collaborator failed.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid session configuration.
    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<basket_core::ValidationError> for SessionError {
    fn from(err: basket_core::ValidationError) -> Self {
        SessionError::Cart(CartError::Validation(err))
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SessionError {
    fn from(err: toml::de::Error) -> Self {
        SessionError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SessionError {
    fn from(err: toml::ser::Error) -> Self {
        SessionError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SessionError {
    /// Returns true if the caller sent a bad request (as opposed to the
    /// environment failing).
    pub fn is_rejection(&self) -> bool {
        matches!(self, SessionError::Cart(_))
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidConfig(_)
                | SessionError::ConfigLoadFailed(_)
                | SessionError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basket_core::ValidationError;

    #[test]
    fn test_cart_errors_are_rejections() {
        let err: SessionError = CartError::ItemNotFound("r1".into()).into();
        assert!(err.is_rejection());
        assert_eq!(err.to_string(), "Item not found: r1");

        let err: SessionError = ValidationError::missing("id").into();
        assert!(matches!(err, SessionError::Cart(CartError::Validation(_))));
    }

    #[test]
    fn test_store_errors() {
        let err: SessionError = StoreError::InvalidInstanceName("../x".into()).into();
        assert!(!err.is_rejection());
        assert!(err.to_string().contains("../x"));
    }

    #[test]
    fn test_config_errors() {
        assert!(SessionError::InvalidConfig("x".into()).is_config_error());
        let err: SessionError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.is_config_error());
    }
}
