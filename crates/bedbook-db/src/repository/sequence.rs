//! # Sequence Repository
//!
//! Day-scoped counters behind booking and invoice numbers.
//!
//! ```text
//! daily_sequences
//! ┌──────────┬────────────┬────────────┐
//! │ scope    │ day        │ last_value │
//! ├──────────┼────────────┼────────────┤
//! │ booking  │ 2026-03-02 │ 7          │   → next: BK-20260302-0008
//! │ invoice  │ 2026-03-02 │ 3          │   → next: INV-20260302-0004
//! └──────────┴────────────┴────────────┘
//! ```
//!
//! The counter is advanced by one `INSERT … ON CONFLICT DO UPDATE …
//! RETURNING` statement. Run it on the same transaction as the insert that
//! consumes the number and a rollback gives the number back.

use bedbook_core::numbering::{format_number, DocumentKind};
use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

/// Repository for document number sequences.
#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Allocates the next number of `kind` for `day` in its own statement.
    pub async fn next_number(&self, kind: DocumentKind, day: NaiveDate) -> DbResult<String> {
        let mut conn = self.pool.acquire().await?;
        next_number(&mut conn, kind, day).await
    }

    /// Last value handed out for `kind` on `day` (0 if none yet).
    pub async fn current(&self, kind: DocumentKind, day: NaiveDate) -> DbResult<i64> {
        let value: Option<i64> = sqlx::query_scalar(
            "SELECT last_value FROM daily_sequences WHERE scope = ?1 AND day = ?2",
        )
        .bind(kind.scope())
        .bind(day.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(value.unwrap_or(0))
    }
}

/// Advances the counter on an existing connection or transaction.
pub(crate) async fn next_value(
    conn: &mut SqliteConnection,
    kind: DocumentKind,
    day: NaiveDate,
) -> DbResult<i64> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO daily_sequences (scope, day, last_value)
        VALUES (?1, ?2, 1)
        ON CONFLICT (scope, day) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(kind.scope())
    .bind(day.to_string())
    .fetch_one(&mut *conn)
    .await?;

    debug!(scope = kind.scope(), %day, value, "Advanced sequence");
    Ok(value)
}

/// Advances the counter and formats the resulting number.
pub(crate) async fn next_number(
    conn: &mut SqliteConnection,
    kind: DocumentKind,
    day: NaiveDate,
) -> DbResult<String> {
    let value = next_value(conn, kind, day).await?;
    Ok(format_number(kind, day, value))
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use bedbook_core::numbering::DocumentKind;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_numbers_are_day_scoped() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let seq = db.sequences();
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();

        assert_eq!(
            seq.next_number(DocumentKind::Booking, monday).await.unwrap(),
            "BK-20260302-0001"
        );
        assert_eq!(
            seq.next_number(DocumentKind::Booking, monday).await.unwrap(),
            "BK-20260302-0002"
        );
        assert_eq!(
            seq.next_number(DocumentKind::Booking, tuesday).await.unwrap(),
            "BK-20260303-0001"
        );
        assert_eq!(
            seq.next_number(DocumentKind::Invoice, monday).await.unwrap(),
            "INV-20260302-0001"
        );
        assert_eq!(seq.current(DocumentKind::Booking, monday).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rolled_back_number_is_reused() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let value = super::next_value(&mut tx, DocumentKind::Invoice, day)
            .await
            .unwrap();
        assert_eq!(value, 1);
        tx.rollback().await.unwrap();

        assert_eq!(db.sequences().current(DocumentKind::Invoice, day).await.unwrap(), 0);
    }
}
