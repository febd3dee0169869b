//! # Error Types
//!
//! Domain-specific error types for basket-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  basket-core errors (this file)                                        │
//! │  ├── CartError        - Cart CRUD failures                             │
//! │  └── ValidationError  - Item input validation failures                 │
//! │                                                                         │
//! │  basket-session errors (separate crate)                                │
//! │  ├── StoreError       - Storage collaborator failures                  │
//! │  └── SessionError     - What callers of the session see                │
//! │                                                                         │
//! │  Flow: ValidationError → CartError → SessionError → Caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## What Never Errors
//! The condition engine. A malformed rule or action value makes its
//! condition contribute nothing; it never aborts pricing for the cart.

use thiserror::Error;

// =============================================================================
// Cart Error
// =============================================================================

/// Cart CRUD errors.
///
/// Raised synchronously by the offending call. A failed call leaves the
/// cart exactly as it was before the call.
#[derive(Debug, Error)]
pub enum CartError {
    /// No line with this row id exists in the cart.
    ///
    /// ## When This Occurs
    /// - `update`, `remove` or `item` with a stale row id
    /// - Row id from another cart instance
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// One record of a batch add failed validation.
    ///
    /// Batches are atomic: nothing from the batch was committed.
    #[error("Batch record {index} rejected: {source}")]
    BatchRecord {
        index: usize,
        #[source]
        source: ValidationError,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CartError {
    /// Returns the validation failure behind this error, if any.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            CartError::Validation(err) | CartError::BatchRecord { source: err, .. } => Some(err),
            CartError::ItemNotFound(_) => None,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Item input validation errors.
///
/// These errors occur when an add/update record doesn't meet requirements.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required key is missing, null or empty.
    #[error("{field} is required")]
    MissingRequiredField { field: String },

    /// Quantity is non-numeric, or not positive once truncated.
    #[error("quantity must be a positive integer, got {value}")]
    InvalidQuantity { value: String },

    /// Price is not numeric.
    #[error("price must be numeric, got {value}")]
    InvalidPrice { value: String },

    /// Another numeric field (weight, attribute price) is not numeric.
    #[error("{field} must be numeric, got {value}")]
    InvalidNumber { field: String, value: String },

    /// Attributes field is present but not a map or sequence of maps.
    #[error("attributes are invalid: {reason}")]
    InvalidAttributes { reason: String },

    /// Conditions field cannot be read as condition records.
    #[error("conditions are invalid: {reason}")]
    InvalidConditions { reason: String },

    /// The item record itself is not a map.
    #[error("item record must be a map, got {kind}")]
    InvalidRecord { kind: String },
}

impl ValidationError {
    /// Creates a MissingRequiredField error.
    pub fn missing(field: impl Into<String>) -> Self {
        ValidationError::MissingRequiredField {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CartError.
pub type CartResult<T> = Result<T, CartError>;

// =============================================================================
// Unit Tests
// =============================================================================
