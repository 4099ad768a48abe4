//! # Booking Commands
//!
//! Beds, slots and the booking lifecycle.
//!
//! ## Booking Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  available_slots ──► book_slot ──► confirm_booking ──► check_in ──►    │
//! │                         │               │                  │           │
//! │                         │               │                  ▼           │
//! │                   reschedule_booking    │          complete_booking    │
//! │                         │               │                              │
//! │                         └───────────────┴──────► cancel_booking        │
//! │                                                                         │
//! │  delete_booking / restore_booking toggle scheduling visibility only.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bedbook_core::availability::{self, candidate_slots};
use bedbook_core::validation::validate_duration_minutes;
use bedbook_core::{
    Allocation, AllocationStatus, BookingRequest, CoreError, MembershipPackage, Resource,
    ResourceStatus, TimeWindow, ValidationError,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ApiResult;
use crate::state::FrontDesk;

/// Input for [`book_slot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSlotInput {
    pub bed_id: String,
    pub customer_id: Option<String>,
    /// Package that will pay for this booking with one session.
    pub membership_package_id: Option<String>,
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
    pub total_amount_cents: i64,
    /// Defaults to `total_amount_cents`.
    pub final_amount_cents: Option<i64>,
    /// Book straight into `confirmed` instead of `pending`.
    #[serde(default)]
    pub confirm: bool,
    pub notes: Option<String>,
}

/// One row of the bed status board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BedStatus {
    pub bed_id: String,
    pub name: String,
    pub status: ResourceStatus,
}

/// Result of [`check_in`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResponse {
    pub booking: Allocation,
    /// The package after the session was drawn, if the booking uses one.
    pub package: Option<MembershipPackage>,
}

// =============================================================================
// Beds
// =============================================================================

pub async fn register_bed(desk: &FrontDesk, name: &str) -> ApiResult<Resource> {
    debug!(name = %name, "register_bed command");

    let bed = Resource::new(name.trim(), desk.now());
    desk.db().resources().insert(&bed).await?;

    info!(bed_id = %bed.id, name = %bed.name, "Bed registered");
    Ok(bed)
}

pub async fn set_maintenance(desk: &FrontDesk, bed_id: &str, maintenance: bool) -> ApiResult<Resource> {
    debug!(bed_id = %bed_id, maintenance, "set_maintenance command");

    let resources = desk.db().resources();
    resources.set_maintenance(bed_id, maintenance, desk.now()).await?;

    info!(bed_id = %bed_id, maintenance, "Maintenance flag changed");
    Ok(resources.get(bed_id).await?)
}

pub async fn retire_bed(desk: &FrontDesk, bed_id: &str) -> ApiResult<()> {
    debug!(bed_id = %bed_id, "retire_bed command");

    desk.db().resources().deactivate(bed_id, desk.now()).await?;

    info!(bed_id = %bed_id, "Bed retired");
    Ok(())
}

/// Free slots of `duration_minutes` on `date` (business-local).
pub async fn available_slots(
    desk: &FrontDesk,
    bed_id: &str,
    date: NaiveDate,
    duration_minutes: i64,
) -> ApiResult<Vec<TimeWindow>> {
    debug!(bed_id = %bed_id, %date, duration_minutes, "available_slots command");

    let bed = desk.db().resources().get(bed_id).await?;
    let day = desk.hours().day_window(date);
    let bookings = desk
        .db()
        .allocations()
        .list_overlapping(Some(bed_id), &day)
        .await?;

    let slots: Vec<TimeWindow> = candidate_slots(
        &bed,
        &bookings,
        date,
        duration_minutes,
        desk.now(),
        desk.hours(),
    )?
    .collect();

    debug!(bed_id = %bed_id, count = slots.len(), "Slots computed");
    Ok(slots)
}

/// Current status of every active bed, ordered by name.
pub async fn status_board(desk: &FrontDesk) -> ApiResult<Vec<BedStatus>> {
    debug!("status_board command");

    let now = desk.now();
    let hours = desk.hours();
    let beds = desk.db().resources().list_active().await?;

    // Widened by a millisecond each side: a booking ending exactly now still
    // counts as occupied, one starting exactly at the horizon as booked soon.
    let window = TimeWindow::new(
        now - Duration::milliseconds(1),
        now + Duration::minutes(hours.booked_soon_minutes) + Duration::milliseconds(1),
    )?;
    let bookings = desk.db().allocations().list_overlapping(None, &window).await?;

    Ok(beds
        .iter()
        .map(|bed| BedStatus {
            bed_id: bed.id.clone(),
            name: bed.name.clone(),
            status: availability::status(bed, &bookings, now, hours),
        })
        .collect())
}

// =============================================================================
// Bookings
// =============================================================================

pub async fn book_slot(desk: &FrontDesk, input: BookSlotInput) -> ApiResult<Allocation> {
    debug!(bed_id = %input.bed_id, start = %input.start, "book_slot command");

    let now = desk.now();
    let window = booking_window(input.start, input.duration_minutes)?;

    if let Some(package_id) = &input.membership_package_id {
        let package = desk.db().memberships().get(package_id).await?;
        if !package.is_active() {
            warn!(package_id = %package_id, "Booking against unusable package");
            return Err(CoreError::invalid_state(
                "MembershipPackage",
                package_id,
                "inactive or exhausted",
            )
            .into());
        }
    }

    let request = BookingRequest {
        resource_id: input.bed_id,
        customer_id: input.customer_id,
        membership_package_id: input.membership_package_id,
        window,
        total_amount_cents: input.total_amount_cents,
        final_amount_cents: input.final_amount_cents.unwrap_or(input.total_amount_cents),
        notes: input.notes,
    };
    let status = if input.confirm {
        AllocationStatus::Confirmed
    } else {
        AllocationStatus::Pending
    };

    let booking = desk
        .db()
        .allocations()
        .create(&request, status, desk.business_day(now), now)
        .await?;

    info!(
        booking_id = %booking.id,
        booking_number = %booking.booking_number,
        bed_id = %booking.resource_id,
        status = booking.status.as_str(),
        "Booking created"
    );
    Ok(booking)
}

pub async fn reschedule_booking(
    desk: &FrontDesk,
    booking_id: &str,
    start: DateTime<Utc>,
    duration_minutes: i64,
) -> ApiResult<Allocation> {
    debug!(booking_id = %booking_id, %start, duration_minutes, "reschedule_booking command");

    let window = booking_window(start, duration_minutes)?;
    let booking = desk
        .db()
        .allocations()
        .reschedule(booking_id, window, desk.now())
        .await?;

    info!(booking_id = %booking_id, start = %booking.window.start, "Booking rescheduled");
    Ok(booking)
}

/// Validates the duration before any time arithmetic runs.
fn booking_window(start: DateTime<Utc>, duration_minutes: i64) -> ApiResult<TimeWindow> {
    validate_duration_minutes(duration_minutes).map_err(CoreError::from)?;
    let end = start
        .checked_add_signed(Duration::minutes(duration_minutes))
        .ok_or_else(|| {
            CoreError::from(ValidationError::OutOfRange {
                field: "start".to_string(),
                min: DateTime::<Utc>::MIN_UTC.timestamp(),
                max: DateTime::<Utc>::MAX_UTC.timestamp(),
            })
        })?;
    Ok(TimeWindow::new(start, end)?)
}

pub async fn confirm_booking(desk: &FrontDesk, booking_id: &str) -> ApiResult<Allocation> {
    transition(desk, booking_id, AllocationStatus::Confirmed).await
}

pub async fn cancel_booking(desk: &FrontDesk, booking_id: &str) -> ApiResult<Allocation> {
    transition(desk, booking_id, AllocationStatus::Cancelled).await
}

pub async fn complete_booking(desk: &FrontDesk, booking_id: &str) -> ApiResult<Allocation> {
    transition(desk, booking_id, AllocationStatus::Completed).await
}

/// Starts a confirmed booking, drawing one session from its package if it
/// has one. The session and the status change commit together.
pub async fn check_in(desk: &FrontDesk, booking_id: &str) -> ApiResult<CheckInResponse> {
    debug!(booking_id = %booking_id, "check_in command");

    let (booking, package) = desk
        .db()
        .allocations()
        .check_in(booking_id, desk.now())
        .await?;

    if let Some(package) = &package {
        info!(
            package_id = %package.id,
            sessions_used = package.sessions_used,
            status = package.status.as_str(),
            "Session drawn for check-in"
        );
    }
    info!(booking_id = %booking_id, "Checked in");
    Ok(CheckInResponse { booking, package })
}

/// Removes a booking from scheduling without erasing it.
pub async fn delete_booking(desk: &FrontDesk, booking_id: &str) -> ApiResult<Allocation> {
    debug!(booking_id = %booking_id, "delete_booking command");

    let booking = desk.db().allocations().soft_delete(booking_id, desk.now()).await?;

    info!(booking_id = %booking_id, "Booking deleted");
    Ok(booking)
}

/// Puts a deleted booking back, if its window is still free.
pub async fn restore_booking(desk: &FrontDesk, booking_id: &str) -> ApiResult<Allocation> {
    debug!(booking_id = %booking_id, "restore_booking command");

    let booking = desk.db().allocations().restore(booking_id, desk.now()).await?;

    info!(booking_id = %booking_id, "Booking restored");
    Ok(booking)
}

async fn transition(
    desk: &FrontDesk,
    booking_id: &str,
    next: AllocationStatus,
) -> ApiResult<Allocation> {
    debug!(booking_id = %booking_id, next = next.as_str(), "booking transition command");

    let booking = desk
        .db()
        .allocations()
        .transition(booking_id, next, desk.now())
        .await?;

    info!(booking_id = %booking_id, status = booking.status.as_str(), "Booking status changed");
    Ok(booking)
}
