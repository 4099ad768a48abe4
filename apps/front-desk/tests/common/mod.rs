use std::sync::Arc;

use bedbook_core::FixedClock;
use bedbook_db::{Database, DbConfig};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use front_desk::{DeskConfig, FrontDesk};

pub struct Harness {
    pub desk: FrontDesk,
    pub clock: Arc<FixedClock>,
}

/// Monday 2 March 2026, in UTC (business offset 0).
pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
}

pub async fn harness() -> Harness {
    harness_with(DeskConfig::with_database(":memory:")).await
}

pub async fn harness_with(config: DeskConfig) -> Harness {
    front_desk::init_tracing();

    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let clock = Arc::new(FixedClock::new(at(7, 0)));
    let desk = FrontDesk::new(db, clock.clone(), config);
    Harness { desk, clock }
}
