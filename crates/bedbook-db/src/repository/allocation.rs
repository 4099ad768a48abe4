//! # Allocation Repository
//!
//! Database operations for bookings.
//!
//! ## Booking Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   create() / reschedule() / restore()                   │
//! │                                                                         │
//! │  BEGIN                                                                 │
//! │   ├── load resource                          (NotFound)                │
//! │   ├── load live allocations overlapping the window                     │
//! │   ├── availability::check_booking()          (Validation / InvalidState│
//! │   │                                           / Conflict with ids)     │
//! │   ├── next BK number from daily_sequences    (create only)             │
//! │   └── INSERT / UPDATE                                                  │
//! │         └── overlap trigger re-checks        (DbError::Overlap)        │
//! │  COMMIT                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine check gives callers a precise conflict naming the bookings in
//! the way. The trigger is the backstop when two writers race.

use bedbook_core::availability::check_booking;
use bedbook_core::numbering::DocumentKind;
use bedbook_core::{
    Allocation, AllocationStatus, BookingPaymentStatus, BookingRequest, CoreError, CoreResult,
    MembershipPackage, TimeWindow,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{membership, resource, sequence};

const SELECT_ALLOCATION: &str = r#"
    SELECT
        id, resource_id, customer_id, membership_package_id, booking_number,
        start_at, end_at, status, payment_status,
        total_amount_cents, final_amount_cents, notes,
        created_at, updated_at, deleted_at
    FROM allocations
"#;

/// Storage shape of an allocation: the window is kept as epoch milliseconds.
#[derive(Debug, sqlx::FromRow)]
struct AllocationRow {
    id: String,
    resource_id: String,
    customer_id: Option<String>,
    membership_package_id: Option<String>,
    booking_number: String,
    start_at: i64,
    end_at: i64,
    status: AllocationStatus,
    payment_status: BookingPaymentStatus,
    total_amount_cents: i64,
    final_amount_cents: i64,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

fn from_millis(millis: i64) -> DbResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| DbError::Internal(format!("invalid allocation timestamp {millis}")))
}

impl TryFrom<AllocationRow> for Allocation {
    type Error = DbError;

    fn try_from(row: AllocationRow) -> DbResult<Self> {
        Ok(Allocation {
            id: row.id,
            resource_id: row.resource_id,
            customer_id: row.customer_id,
            membership_package_id: row.membership_package_id,
            booking_number: row.booking_number,
            window: TimeWindow {
                start: from_millis(row.start_at)?,
                end: from_millis(row.end_at)?,
            },
            status: row.status,
            payment_status: row.payment_status,
            total_amount_cents: row.total_amount_cents,
            final_amount_cents: row.final_amount_cents,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

fn into_allocations(rows: Vec<AllocationRow>) -> DbResult<Vec<Allocation>> {
    rows.into_iter().map(Allocation::try_from).collect()
}

/// Repository for allocation database operations.
#[derive(Debug, Clone)]
pub struct AllocationRepository {
    pool: SqlitePool,
}

impl AllocationRepository {
    /// Creates a new AllocationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AllocationRepository { pool }
    }

    /// Books a window on a resource.
    ///
    /// `status` must be `Pending` or `Confirmed`. `day` is the business-local
    /// date used for the booking number.
    pub async fn create(
        &self,
        request: &BookingRequest,
        status: AllocationStatus,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> DbResult<Allocation> {
        if !matches!(status, AllocationStatus::Pending | AllocationStatus::Confirmed) {
            return Err(CoreError::invalid_state(
                "Allocation",
                "new",
                format!("cannot be created as {}", status.as_str()),
            )
            .into());
        }
        if request.final_amount_cents > request.total_amount_cents
            || request.final_amount_cents < 0
        {
            return Err(bedbook_core::ValidationError::OutOfRange {
                field: "final_amount".to_string(),
                min: 0,
                max: request.total_amount_cents,
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let bed = resource::fetch(&mut tx, &request.resource_id)
            .await?
            .ok_or_else(|| DbError::not_found("Resource", &request.resource_id))?;
        let existing = overlapping(&mut tx, &request.resource_id, &request.window, None).await?;
        check_booking(&bed, &existing, &request.window, None)?;

        let booking_number = sequence::next_number(&mut tx, DocumentKind::Booking, day).await?;
        let allocation = Allocation {
            id: Uuid::new_v4().to_string(),
            resource_id: request.resource_id.clone(),
            customer_id: request.customer_id.clone(),
            membership_package_id: request.membership_package_id.clone(),
            booking_number,
            window: request.window,
            status,
            payment_status: BookingPaymentStatus::Pending,
            total_amount_cents: request.total_amount_cents,
            final_amount_cents: request.final_amount_cents,
            notes: request.notes.clone(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        debug!(
            id = %allocation.id,
            booking_number = %allocation.booking_number,
            resource_id = %allocation.resource_id,
            start = %allocation.window.start,
            end = %allocation.window.end,
            "Inserting allocation"
        );

        sqlx::query(
            r#"
            INSERT INTO allocations (
                id, resource_id, customer_id, membership_package_id, booking_number,
                start_at, end_at, status, payment_status,
                total_amount_cents, final_amount_cents, notes,
                created_at, updated_at, deleted_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9,
                ?10, ?11, ?12,
                ?13, ?14, ?15
            )
            "#,
        )
        .bind(&allocation.id)
        .bind(&allocation.resource_id)
        .bind(&allocation.customer_id)
        .bind(&allocation.membership_package_id)
        .bind(&allocation.booking_number)
        .bind(allocation.window.start.timestamp_millis())
        .bind(allocation.window.end.timestamp_millis())
        .bind(allocation.status)
        .bind(allocation.payment_status)
        .bind(allocation.total_amount_cents)
        .bind(allocation.final_amount_cents)
        .bind(&allocation.notes)
        .bind(allocation.created_at)
        .bind(allocation.updated_at)
        .bind(allocation.deleted_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(allocation)
    }

    /// Gets an allocation by ID (deleted ones included).
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Allocation>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Gets an allocation by ID, failing with NotFound.
    pub async fn get(&self, id: &str) -> DbResult<Allocation> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Allocation", id))
    }

    /// Gets an allocation by its booking number.
    pub async fn get_by_number(&self, booking_number: &str) -> DbResult<Option<Allocation>> {
        let row = sqlx::query_as::<_, AllocationRow>(&format!(
            "{SELECT_ALLOCATION} WHERE booking_number = ?1"
        ))
        .bind(booking_number)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Allocation::try_from).transpose()
    }

    /// Lists non-deleted allocations overlapping `window`, cancelled ones
    /// included, ordered by start. `resource_id = None` spans every bed.
    pub async fn list_overlapping(
        &self,
        resource_id: Option<&str>,
        window: &TimeWindow,
    ) -> DbResult<Vec<Allocation>> {
        let rows = sqlx::query_as::<_, AllocationRow>(&format!(
            r#"{SELECT_ALLOCATION}
            WHERE (?1 IS NULL OR resource_id = ?1)
              AND deleted_at IS NULL
              AND start_at < ?3
              AND end_at > ?2
            ORDER BY start_at, resource_id"#
        ))
        .bind(resource_id)
        .bind(window.start.timestamp_millis())
        .bind(window.end.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), ?resource_id, "Listed allocations in window");
        into_allocations(rows)
    }

    /// Moves a pending or confirmed booking to a new window.
    pub async fn reschedule(
        &self,
        id: &str,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> DbResult<Allocation> {
        let mut tx = self.pool.begin().await?;

        let mut allocation = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Allocation", id))?;
        if allocation.deleted_at.is_some()
            || !matches!(
                allocation.status,
                AllocationStatus::Pending | AllocationStatus::Confirmed
            )
        {
            return Err(CoreError::invalid_state(
                "Allocation",
                id,
                format!("cannot reschedule a {} booking", allocation.status.as_str()),
            )
            .into());
        }

        let bed = resource::fetch(&mut tx, &allocation.resource_id)
            .await?
            .ok_or_else(|| DbError::not_found("Resource", &allocation.resource_id))?;
        let existing = overlapping(&mut tx, &allocation.resource_id, &window, Some(id)).await?;
        check_booking(&bed, &existing, &window, Some(id))?;

        allocation.window = window;
        allocation.updated_at = now;

        debug!(id = %id, start = %window.start, end = %window.end, "Rescheduling allocation");
        sqlx::query("UPDATE allocations SET start_at = ?2, end_at = ?3, updated_at = ?4 WHERE id = ?1")
            .bind(id)
            .bind(window.start.timestamp_millis())
            .bind(window.end.timestamp_millis())
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(allocation)
    }

    /// Moves a booking along its lifecycle.
    pub async fn transition(
        &self,
        id: &str,
        next: AllocationStatus,
        at: DateTime<Utc>,
    ) -> DbResult<Allocation> {
        self.update_with(id, |a| a.transition(next, at)).await
    }

    /// Starts a booking and draws one session from its package, if it has
    /// one, in a single transaction.
    ///
    /// Either both rows change or neither does. The booking write is guarded
    /// on the status it was read with and the package write on its version,
    /// so a concurrent cancel or check-in surfaces as `Concurrency`.
    pub async fn check_in(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> DbResult<(Allocation, Option<MembershipPackage>)> {
        let mut tx = self.pool.begin().await?;

        let mut allocation = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Allocation", id))?;
        if allocation.deleted_at.is_some() {
            return Err(CoreError::invalid_state("Allocation", id, "deleted").into());
        }
        let read_status = allocation.status;
        allocation.transition(AllocationStatus::InProgress, at)?;

        let package = match allocation.membership_package_id.clone() {
            Some(package_id) => {
                let mut package = membership::fetch(&mut tx, &package_id)
                    .await?
                    .ok_or_else(|| DbError::not_found("MembershipPackage", &package_id))?;
                package.use_session(at)?;
                membership::write(&mut tx, &package).await?;
                package.version += 1;
                Some(package)
            }
            None => None,
        };

        let result = sqlx::query(
            r#"
            UPDATE allocations SET
                status = ?3,
                updated_at = ?4
            WHERE id = ?1 AND status = ?2 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(read_status)
        .bind(allocation.status)
        .bind(allocation.updated_at)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::stale("Allocation", id));
        }

        tx.commit().await?;

        debug!(
            id = %id,
            package_id = ?allocation.membership_package_id,
            sessions_used = ?package.as_ref().map(|p| p.sessions_used),
            "Checked in allocation"
        );
        Ok((allocation, package))
    }

    /// Records that the booking has been paid for.
    pub async fn mark_paid(&self, id: &str, at: DateTime<Utc>) -> DbResult<Allocation> {
        self.update_with(id, |a| a.mark_paid(at)).await
    }

    /// Records a refund of a paid booking.
    pub async fn mark_refunded(&self, id: &str, at: DateTime<Utc>) -> DbResult<Allocation> {
        self.update_with(id, |a| a.mark_refunded(at)).await
    }

    /// Soft-deletes a booking, freeing its window.
    pub async fn soft_delete(&self, id: &str, at: DateTime<Utc>) -> DbResult<Allocation> {
        self.update_with(id, |a| {
            if a.deleted_at.is_some() {
                return Err(CoreError::invalid_state("Allocation", &a.id, "already deleted"));
            }
            a.deleted_at = Some(at);
            a.updated_at = at;
            Ok(())
        })
        .await
    }

    /// Reinstates a soft-deleted booking if its window is still free.
    pub async fn restore(&self, id: &str, at: DateTime<Utc>) -> DbResult<Allocation> {
        let mut tx = self.pool.begin().await?;

        let mut allocation = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Allocation", id))?;
        if allocation.deleted_at.is_none() {
            return Err(CoreError::invalid_state("Allocation", id, "not deleted").into());
        }

        // Cancelled bookings never re-enter the schedule.
        if allocation.status != AllocationStatus::Cancelled {
            let bed = resource::fetch(&mut tx, &allocation.resource_id)
                .await?
                .ok_or_else(|| DbError::not_found("Resource", &allocation.resource_id))?;
            let existing =
                overlapping(&mut tx, &allocation.resource_id, &allocation.window, Some(id)).await?;
            check_booking(&bed, &existing, &allocation.window, Some(id))?;
        }

        allocation.deleted_at = None;
        allocation.updated_at = at;
        write_state(&mut tx, &allocation).await?;

        tx.commit().await?;
        Ok(allocation)
    }

    /// Loads, mutates via `f`, and writes back the mutable state columns in
    /// one transaction. Nothing is written when `f` fails.
    async fn update_with<F>(&self, id: &str, f: F) -> DbResult<Allocation>
    where
        F: FnOnce(&mut Allocation) -> CoreResult<()>,
    {
        let mut tx = self.pool.begin().await?;

        let mut allocation = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Allocation", id))?;
        f(&mut allocation)?;
        write_state(&mut tx, &allocation).await?;

        tx.commit().await?;

        debug!(
            id = %id,
            status = allocation.status.as_str(),
            payment_status = ?allocation.payment_status,
            "Updated allocation"
        );
        Ok(allocation)
    }
}

async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Allocation>> {
    let row = sqlx::query_as::<_, AllocationRow>(&format!("{SELECT_ALLOCATION} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(Allocation::try_from).transpose()
}

/// Live allocations on `resource_id` overlapping `window`.
async fn overlapping(
    conn: &mut SqliteConnection,
    resource_id: &str,
    window: &TimeWindow,
    exclude_id: Option<&str>,
) -> DbResult<Vec<Allocation>> {
    let rows = sqlx::query_as::<_, AllocationRow>(&format!(
        r#"{SELECT_ALLOCATION}
        WHERE resource_id = ?1
          AND status <> 'cancelled'
          AND deleted_at IS NULL
          AND start_at < ?3
          AND end_at > ?2
          AND (?4 IS NULL OR id <> ?4)"#
    ))
    .bind(resource_id)
    .bind(window.start.timestamp_millis())
    .bind(window.end.timestamp_millis())
    .bind(exclude_id)
    .fetch_all(&mut *conn)
    .await?;

    into_allocations(rows)
}

async fn write_state(conn: &mut SqliteConnection, allocation: &Allocation) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE allocations SET
            status = ?2,
            payment_status = ?3,
            deleted_at = ?4,
            updated_at = ?5
        WHERE id = ?1
        "#,
    )
    .bind(&allocation.id)
    .bind(allocation.status)
    .bind(allocation.payment_status)
    .bind(allocation.deleted_at)
    .bind(allocation.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
