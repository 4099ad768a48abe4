//! # Front Desk Library
//!
//! Orchestration layer for Bedbook: the only place that calls all three
//! engines (availability, invoice, membership) and the only place that
//! reads the clock.
//!
//! ## Module Organization
//! ```text
//! front_desk/
//! ├── lib.rs          ◄─── You are here (logging setup, exports)
//! ├── state/
//! │   ├── mod.rs      ◄─── FrontDesk (Database + Clock + DeskConfig)
//! │   └── config.rs   ◄─── BEDBOOK_* environment configuration
//! ├── commands/
//! │   ├── booking.rs  ◄─── Beds, slots, booking lifecycle
//! │   ├── billing.rs  ◄─── Invoices and payments
//! │   └── membership.rs ◄─ Prepaid packages
//! └── error.rs        ◄─── API error type for commands
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use std::sync::Arc;
//! use bedbook_core::SystemClock;
//! use front_desk::{commands::booking, DeskConfig, FrontDesk};
//!
//! let config = DeskConfig::from_env()?;
//! let desk = FrontDesk::open(config, Arc::new(SystemClock)).await?;
//! let board = booking::status_board(&desk).await?;
//! ```

pub mod commands;
pub mod error;
pub mod state;

pub use error::{ApiError, ApiResult, ErrorCode};
pub use state::{ConfigError, DeskConfig, FrontDesk};

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,bedbook_core=debug,bedbook_db=debug,front_desk=debug,sqlx=warn";

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=bedbook_db=trace` - Show trace for the database crate only
/// - Default: [`DEFAULT_LOG_FILTER`]
///
/// Calling it again (e.g. from several tests) is a no-op.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
