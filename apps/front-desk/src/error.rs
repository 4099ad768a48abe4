//! # API Error Type
//!
//! Unified error type for front desk commands.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Bedbook                                │
//! │                                                                         │
//! │  Command Function  → Result<T, ApiError>                               │
//! │         │                                                               │
//! │         ├── DbError::QueryFailed("...")     → DATABASE_ERROR (logged)  │
//! │         ├── DbError::Overlap                → CONFLICT                 │
//! │         ├── DbError::Concurrency            → STALE_DATA               │
//! │         ├── CoreError::Validation           → VALIDATION_ERROR         │
//! │         ├── CoreError::Conflict { .. }      → CONFLICT (+ booking ids) │
//! │         ├── CoreError::InvalidState { .. }  → INVALID_STATE            │
//! │         └── CoreError::NotFound { .. }      → NOT_FOUND                │
//! │                                                                         │
//! │  Caller receives:                                                      │
//! │  { "code": "CONFLICT",                                                 │
//! │    "message": "Resource bed-3 is already booked in that window (1 ...)",│
//! │    "conflicting": ["<booking id>"] }                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Internal failures are logged with their detail and replaced by a generic
//! message, so SQL text never reaches a caller.

use bedbook_core::CoreError;
use bedbook_db::DbError;
use serde::Serialize;

use crate::state::ConfigError;

/// Result alias for command functions.
pub type ApiResult<T> = Result<T, ApiError>;

/// API error returned from commands.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// Ids of the bookings a rejected booking collided with.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicting: Vec<String>,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Entity not found
    NotFound,

    /// Input validation failed
    ValidationError,

    /// Time window already taken on the bed
    Conflict,

    /// Operation not allowed in the entity's current state
    InvalidState,

    /// Someone else changed the record first; reload and retry
    StaleData,

    /// Bad configuration value
    ConfigError,

    /// Database operation failed
    DatabaseError,

    /// Internal error
    Internal,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            conflicting: Vec::new(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(entity: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", entity, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::InvalidState, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    /// JSON payload for the caller.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":"INTERNAL","message":"{:?}"}}"#, self.message)
        })
    }
}

/// Converts engine errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Validation(_) => ApiError::validation(message),
            CoreError::Conflict {
                resource_id,
                conflicting,
            } => {
                tracing::warn!(resource_id = %resource_id, ?conflicting, "Booking rejected");
                ApiError {
                    code: ErrorCode::Conflict,
                    message,
                    conflicting,
                }
            }
            CoreError::InvalidState { .. } => {
                tracing::warn!(error = %message, "Operation rejected");
                ApiError::invalid_state(message)
            }
            CoreError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
        }
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => ApiError::from(core),
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::ValidationError,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::Overlap => {
                tracing::warn!("Overlap trigger rejected a booking");
                ApiError::new(
                    ErrorCode::Conflict,
                    "Resource is already booked in that window",
                )
            }
            DbError::Concurrency { entity, id } => ApiError::new(
                ErrorCode::StaleData,
                format!("{} {} was changed by someone else, reload and retry", entity, id),
            ),
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::new(ErrorCode::ConfigError, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
