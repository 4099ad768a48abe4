//! # Error Types
//!
//! Domain-specific error types for bedbook-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bedbook-core errors (this file)                                       │
//! │  ├── CoreError        - Validation / Conflict / InvalidState / NotFound│
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bedbook-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  front-desk errors (app)                                               │
//! │  └── ApiError         - What callers see (serialized)                  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every engine operation fails with exactly one [`ErrorKind`]. Operations
//! validate before they mutate, so an `Err` never leaves a half-updated
//! entity behind.

use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input (non-positive amount, `end <= start`, overpayment).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A booking would overlap one or more existing allocations.
    ///
    /// ## User Workflow
    /// ```text
    /// Bed 3 has 14:00-15:00 confirmed
    ///      │
    ///      ▼
    /// Request 14:30-15:30 on bed 3
    ///      │
    ///      ▼
    /// Conflict { resource_id: "bed-3", conflicting: ["<booking id>"] }
    ///      │
    ///      ▼
    /// UI shows: "Bed 3 is already booked for that time"
    /// ```
    #[error("Resource {resource_id} is already booked in that window ({} conflicting)", conflicting.len())]
    Conflict {
        resource_id: String,
        conflicting: Vec<String>,
    },

    /// Operation not permitted in the entity's current state.
    ///
    /// ## When This Occurs
    /// - Completing an invoice that still has a balance
    /// - Voiding a completed invoice
    /// - Using a session on an inactive or exhausted package
    /// - Scheduling on a bed under maintenance
    #[error("{entity} {id} cannot be changed: {reason}")]
    InvalidState {
        entity: String,
        id: String,
        reason: String,
    },

    /// Referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
}

impl CoreError {
    /// Creates an InvalidState error.
    pub fn invalid_state(
        entity: impl Into<String>,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CoreError::InvalidState {
            entity: entity.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a NotFound error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Returns which taxonomy kind this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Conflict { .. } => ErrorKind::Conflict,
            CoreError::InvalidState { .. } => ErrorKind::InvalidState,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
        }
    }
}

/// The four failure kinds an engine operation can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Conflict,
    InvalidState,
    NotFound,
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// A time window whose end is not after its start.
    #[error("end must be after start")]
    InvalidWindow,

    /// Payment larger than what is still owed.
    #[error("{field} of {amount} exceeds outstanding balance {outstanding}")]
    ExceedsBalance {
        field: String,
        amount: i64,
        outstanding: i64,
    },

    /// Invalid format (e.g., invalid UUID, malformed number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
