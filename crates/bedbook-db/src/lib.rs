//! # bedbook-db: Database Layer for Bedbook
//!
//! SQLite storage for beds, bookings, invoices and membership packages,
//! using sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Bedbook Data Flow                               │
//! │                                                                         │
//! │  front-desk command (book_slot, record_payment, ...)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   bedbook-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌─────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │ Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │ (embedded)  │  │   │
//! │  │   │               │    │ AllocationRepo │    │             │  │   │
//! │  │   │ SqlitePool    │◄───│ InvoiceRepo    │    │ 001_initial │  │   │
//! │  │   │ WAL, FKs on   │    │ MembershipRepo │    │   _schema   │  │   │
//! │  │   └───────────────┘    └────────────────┘    └─────────────┘  │   │
//! │  │             engines from bedbook-core run inside each tx      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   <data dir>/bedbook/bedbook.db                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bedbook_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/bedbook.db")).await?;
//!
//! let beds = db.resources().list_active().await?;
//! let booking = db.allocations().create(&request, AllocationStatus::Confirmed, day, now).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, MigrationStatus};

// Repository re-exports for convenience
pub use repository::allocation::AllocationRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::membership::MembershipRepository;
pub use repository::resource::ResourceRepository;
pub use repository::sequence::SequenceRepository;
