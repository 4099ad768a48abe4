//! # Validation Module
//!
//! Input validation utilities shared by the three engines.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: front-desk commands                                          │
//! │  └── Parsing (payment method names, ids)                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engines (this crate)                                         │
//! │  └── THIS MODULE: quantity, price, rate and amount rules               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK / UNIQUE constraints                                        │
//! │  └── Overlap trigger on allocations                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bedbook_core::validation::{validate_quantity, validate_rate_bps};
//!
//! assert!(validate_quantity(2).is_ok());
//! assert!(validate_rate_bps(12_000).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::Rate;
use crate::{MAX_ITEM_QUANTITY, MAX_SESSIONS_PER_PACKAGE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (bed, package, line item).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line item quantity.
///
/// ## Rules
/// - Must be at least 1
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (complimentary items).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    validate_non_negative("unit_price", cents)
}

/// Validates that a monetary input is not negative.
pub fn validate_non_negative(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a payment or settlement amount in cents.
///
/// ## Rules
/// - Must be positive (> 0)
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_rate_bps(bps: u32) -> ValidationResult<Rate> {
    if bps > Rate::MAX_BPS {
        return Err(ValidationError::OutOfRange {
            field: "rate".to_string(),
            min: 0,
            max: Rate::MAX_BPS as i64,
        });
    }

    Ok(Rate::from_bps(bps))
}

/// Validates the session count of a membership package.
pub fn validate_session_count(sessions: i64) -> ValidationResult<()> {
    if sessions < 1 || sessions > MAX_SESSIONS_PER_PACKAGE {
        return Err(ValidationError::OutOfRange {
            field: "num_of_sessions".to_string(),
            min: 1,
            max: MAX_SESSIONS_PER_PACKAGE,
        });
    }

    Ok(())
}

/// Validates a requested slot length.
///
/// ## Rules
/// - At least one minute
/// - At most one day
pub fn validate_duration_minutes(minutes: i64) -> ValidationResult<()> {
    if !(1..=24 * 60).contains(&minutes) {
        return Err(ValidationError::OutOfRange {
            field: "duration_minutes".to_string(),
            min: 1,
            max: 24 * 60,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use bedbook_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
