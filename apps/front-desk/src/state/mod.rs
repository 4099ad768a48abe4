//! # State Module
//!
//! Everything a command needs, bundled in [`FrontDesk`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    State Architecture                                   │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌──────────────────┐          │
//! │  │   Database   │  │  Arc<dyn Clock>  │  │   DeskConfig     │          │
//! │  │              │  │                  │  │                  │          │
//! │  │  SqlitePool  │  │  SystemClock in  │  │  business hours  │          │
//! │  │  + repos     │  │  production,     │  │  overpayment     │          │
//! │  │              │  │  FixedClock in   │  │  currency        │          │
//! │  │              │  │  tests           │  │                  │          │
//! │  └──────────────┘  └──────────────────┘  └──────────────────┘          │
//! │                                                                         │
//! │  THREAD SAFETY:                                                        │
//! │  • Database: internal connection pool (thread-safe)                    │
//! │  • Clock: Send + Sync by trait bound                                   │
//! │  • DeskConfig: read-only after initialization                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod config;

pub use config::{ConfigError, DeskConfig};

use std::sync::Arc;

use bedbook_core::{BusinessHours, Clock};
use bedbook_db::{Database, DbConfig, DbResult};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

/// Shared handle passed to every command.
#[derive(Clone)]
pub struct FrontDesk {
    db: Database,
    clock: Arc<dyn Clock>,
    config: DeskConfig,
}

impl FrontDesk {
    /// Wraps an already-open database.
    pub fn new(db: Database, clock: Arc<dyn Clock>, config: DeskConfig) -> Self {
        FrontDesk { db, clock, config }
    }

    /// Opens (and migrates) the database named by `config`.
    pub async fn open(config: DeskConfig, clock: Arc<dyn Clock>) -> DbResult<Self> {
        let db = Database::new(DbConfig::new(&config.database_path)).await?;
        info!(path = %config.database_path.display(), "Front desk database ready");
        Ok(FrontDesk::new(db, clock, config))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    pub fn hours(&self) -> &BusinessHours {
        &self.config.hours
    }

    /// Current instant from the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Business-local day of `now`, which scopes document numbers.
    pub fn business_day(&self, now: DateTime<Utc>) -> NaiveDate {
        self.config.hours.local_date(now)
    }
}

impl std::fmt::Debug for FrontDesk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrontDesk")
            .field("db", &self.db)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
