//! # bedbook-core: Pure Business Logic for Bedbook
//!
//! Bookings, billing and prepaid memberships for a bed/station rental
//! business, as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bedbook Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 front-desk (Orchestration)                      │   │
//! │  │   book_slot, add_line, take_payment, use_session, etc.         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ now = clock.now()                      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ bedbook-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐     │   │
//! │  │   │ availability │  │   invoice    │  │    membership    │     │   │
//! │  │   │  conflicts   │  │  recompute   │  │  use_session     │     │   │
//! │  │   │  slots       │  │  payments    │  │  settle_payment  │     │   │
//! │  │   └──────────────┘  └──────────────┘  └──────────────────┘     │   │
//! │  │         none of the three engines call each other               │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO WALL CLOCK • PURE FUNCTIONS        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 bedbook-db (Database Layer)                     │   │
//! │  │     SQLite, overlap trigger, day sequences, version checks      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`availability`] - Conflicts, bed status, candidate slots
//! - [`invoice`] - Line items, charges, payments, billing state machine
//! - [`membership`] - Prepaid session and money balance
//! - [`types`] - Domain types (Resource, Allocation, Invoice, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`numbering`] - Day-scoped document numbers
//! - [`clock`] - Injectable time source
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use bedbook_core::{Invoice, ItemType, PriceSource};
//! use bedbook_core::invoice::ChargeInputs;
//! use chrono::Utc;
//!
//! let now = Utc::now();
//! let mut invoice = Invoice::draft("INV-20260302-0001", None, None, now);
//! invoice
//!     .add_item(ItemType::Package, &PriceSource::custom("60 min", 1000), 1, now)
//!     .unwrap();
//! invoice
//!     .set_charges(
//!         &ChargeInputs {
//!             discount_bps: Some(1000),
//!             service_charge_bps: Some(1000),
//!             ..Default::default()
//!         },
//!         now,
//!     )
//!     .unwrap();
//!
//! assert_eq!(invoice.total_cents, 990);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod availability;
pub mod clock;
pub mod error;
pub mod invoice;
pub mod membership;
pub mod money;
pub mod numbering;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use availability::{BusinessHours, ResourceStatus};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use invoice::{ChargeInputs, OverpaymentPolicy};
pub use membership::NewPackage;
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity on a single invoice line.
///
/// ## Business Reason
/// Catches typos at the counter (1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum number of sessions a membership package can carry.
pub const MAX_SESSIONS_PER_PACKAGE: i64 = 1000;
