//! # Availability Engine
//!
//! Interval conflicts, display status and bookable slots for a bed.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Availability Engine                                   │
//! │                                                                         │
//! │  Gateway: "allocations for bed X overlapping the day"                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  &[Allocation] ──► conflicts()        ──► Vec<&Allocation>             │
//! │                ──► status()           ──► Maintenance | Occupied |     │
//! │                                           BookedSoon | Available       │
//! │                ──► candidate_slots()  ──► lazy Iterator<TimeWindow>    │
//! │                ──► check_booking()    ──► Ok | Validation | Conflict   │
//! │                                                                         │
//! │  Pure functions: same slice + same now = same answer                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Conflicts count every non-cancelled booking, paid or not. The displayed
//! status only counts paid bookings that are confirmed or in progress.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{Allocation, Resource, TimeWindow};
use crate::validation::validate_duration_minutes;

// =============================================================================
// Business Hours
// =============================================================================

/// Opening hours and scheduling grid of the business.
///
/// ## Defaults
/// - Open 08:00, close 22:00 (business-local time)
/// - 30-minute slot grid
/// - "Booked soon" when a paid booking starts within 30 minutes
/// - UTC offset 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub slot_step_minutes: i64,
    pub booked_soon_minutes: i64,
    /// Offset of business-local time from UTC, in minutes (e.g. 330 for +05:30).
    pub utc_offset_minutes: i32,
}

impl BusinessHours {
    /// Creates business hours, rejecting `close <= open` and non-positive steps.
    pub fn new(
        open: NaiveTime,
        close: NaiveTime,
        slot_step_minutes: i64,
        booked_soon_minutes: i64,
        utc_offset_minutes: i32,
    ) -> CoreResult<Self> {
        if close <= open {
            return Err(ValidationError::InvalidWindow.into());
        }
        if slot_step_minutes <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "slot_step_minutes".to_string(),
            }
            .into());
        }
        if booked_soon_minutes < 0 {
            return Err(ValidationError::MustNotBeNegative {
                field: "booked_soon_minutes".to_string(),
            }
            .into());
        }
        if utc_offset_minutes.abs() >= 24 * 60 {
            return Err(ValidationError::OutOfRange {
                field: "utc_offset_minutes".to_string(),
                min: -(24 * 60 - 1),
                max: 24 * 60 - 1,
            }
            .into());
        }
        Ok(BusinessHours {
            open,
            close,
            slot_step_minutes,
            booked_soon_minutes,
            utc_offset_minutes,
        })
    }

    /// Converts a business-local wall time on `date` to an instant.
    pub fn instant_at(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let local = date.and_time(time);
        let utc = local - Duration::minutes(self.utc_offset_minutes as i64);
        DateTime::from_naive_utc_and_offset(utc, Utc)
    }

    /// The business-local calendar day containing `now`.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        (now.naive_utc() + Duration::minutes(self.utc_offset_minutes as i64)).date()
    }

    /// The opening window of `date` as instants.
    pub fn day_window(&self, date: NaiveDate) -> TimeWindow {
        TimeWindow {
            start: self.instant_at(date, self.open),
            end: self.instant_at(date, self.close),
        }
    }
}

impl Default for BusinessHours {
    fn default() -> Self {
        BusinessHours {
            open: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or(NaiveTime::MIN),
            slot_step_minutes: 30,
            booked_soon_minutes: 30,
            utc_offset_minutes: 0,
        }
    }
}

// =============================================================================
// Conflicts
// =============================================================================

/// Returns every scheduling-relevant allocation on `resource_id` that
/// overlaps `window`.
///
/// `exclude_allocation_id` skips the booking being edited so a reschedule
/// does not conflict with itself.
pub fn conflicts<'a>(
    allocations: &'a [Allocation],
    resource_id: &str,
    window: &TimeWindow,
    exclude_allocation_id: Option<&str>,
) -> Vec<&'a Allocation> {
    allocations
        .iter()
        .filter(|a| a.resource_id == resource_id)
        .filter(|a| a.blocks_schedule())
        .filter(|a| exclude_allocation_id != Some(a.id.as_str()))
        .filter(|a| a.window.overlaps(window))
        .collect()
}

/// Validates that `window` may be booked on `resource`.
///
/// ## Checks (in order)
/// 1. `end > start` → `ValidationError`
/// 2. Resource active and not under maintenance → `InvalidState`
/// 3. No overlapping allocation → `Conflict`
pub fn check_booking(
    resource: &Resource,
    allocations: &[Allocation],
    window: &TimeWindow,
    exclude_allocation_id: Option<&str>,
) -> CoreResult<()> {
    if window.end <= window.start {
        return Err(ValidationError::InvalidWindow.into());
    }
    if resource.maintenance {
        return Err(CoreError::invalid_state(
            "Resource",
            &resource.id,
            "under maintenance",
        ));
    }
    if !resource.is_active {
        return Err(CoreError::invalid_state("Resource", &resource.id, "inactive"));
    }

    let clashing = conflicts(allocations, &resource.id, window, exclude_allocation_id);
    if !clashing.is_empty() {
        return Err(CoreError::Conflict {
            resource_id: resource.id.clone(),
            conflicting: clashing.iter().map(|a| a.id.clone()).collect(),
        });
    }

    Ok(())
}

// =============================================================================
// Status
// =============================================================================

/// What the front desk board shows for a bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Maintenance,
    Occupied,
    BookedSoon,
    Available,
}

/// Derives the display status of `resource` at `now`.
///
/// ## Rules
/// ```text
/// maintenance flag set                              → Maintenance
/// paid booking with start <= now <= end               → Occupied
/// paid booking with now < start <= now + soon window  → BookedSoon
/// otherwise                                           → Available
/// ```
pub fn status(
    resource: &Resource,
    allocations: &[Allocation],
    now: DateTime<Utc>,
    hours: &BusinessHours,
) -> ResourceStatus {
    if resource.maintenance {
        return ResourceStatus::Maintenance;
    }

    let counting = || {
        allocations
            .iter()
            .filter(|a| a.resource_id == resource.id)
            .filter(|a| a.drives_status())
    };

    if counting().any(|a| a.window.start <= now && now <= a.window.end) {
        return ResourceStatus::Occupied;
    }

    let horizon = now + Duration::minutes(hours.booked_soon_minutes);
    if counting().any(|a| now < a.window.start && a.window.start <= horizon) {
        return ResourceStatus::BookedSoon;
    }

    ResourceStatus::Available
}

// =============================================================================
// Candidate Slots
// =============================================================================

/// Lazy, ordered sequence of free slots for one bed on one day.
///
/// Cloning the iterator restarts from the clone point.
#[derive(Debug, Clone)]
pub struct CandidateSlots<'a> {
    blocking: Vec<&'a Allocation>,
    cursor: DateTime<Utc>,
    close: DateTime<Utc>,
    duration: Duration,
    step: Duration,
    now: DateTime<Utc>,
}

impl<'a> Iterator for CandidateSlots<'a> {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<TimeWindow> {
        while self.cursor + self.duration <= self.close {
            let slot = TimeWindow {
                start: self.cursor,
                end: self.cursor + self.duration,
            };
            self.cursor += self.step;

            if slot.start < self.now {
                continue;
            }
            if self.blocking.iter().any(|a| a.window.overlaps(&slot)) {
                continue;
            }
            return Some(slot);
        }
        None
    }
}

/// Enumerates bookable `(t, t + duration)` slots on `date`.
///
/// ## Rules
/// - `t` steps from opening time in `slot_step_minutes` increments
/// - `t + duration` must not pass closing time
/// - The slot must not conflict with any non-cancelled booking
/// - `t >= now` (no slots in the past)
/// - A bed under maintenance or inactive has no slots
///
/// ## Example
/// ```rust
/// use bedbook_core::availability::{candidate_slots, BusinessHours};
/// use bedbook_core::types::Resource;
/// use chrono::{NaiveDate, TimeZone, Utc};
///
/// let hours = BusinessHours::default();
/// let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
/// let bed = Resource::new("Bed 1", Utc::now());
/// let now = Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap();
///
/// let slots: Vec<_> = candidate_slots(&bed, &[], day, 60, now, &hours)
///     .unwrap()
///     .collect();
/// // 08:00 .. 21:00 starts on a 30-minute grid
/// assert_eq!(slots.len(), 27);
/// ```
pub fn candidate_slots<'a>(
    resource: &Resource,
    allocations: &'a [Allocation],
    date: NaiveDate,
    duration_minutes: i64,
    now: DateTime<Utc>,
    hours: &BusinessHours,
) -> CoreResult<CandidateSlots<'a>> {
    validate_duration_minutes(duration_minutes)?;

    let day = hours.day_window(date);
    let blocking = allocations
        .iter()
        .filter(|a| a.resource_id == resource.id)
        .filter(|a| a.blocks_schedule())
        .collect();

    // An unschedulable bed yields an already-exhausted iterator.
    let close = if resource.is_schedulable() {
        day.end
    } else {
        day.start
    };

    Ok(CandidateSlots {
        blocking,
        cursor: day.start,
        close,
        duration: Duration::minutes(duration_minutes),
        step: Duration::minutes(hours.slot_step_minutes),
        now,
    })
}

/// Derives the status of every bed at once.
pub fn status_board(
    resources: &[Resource],
    allocations: &[Allocation],
    now: DateTime<Utc>,
    hours: &BusinessHours,
) -> Vec<(String, ResourceStatus)> {
    resources
        .iter()
        .filter(|r| r.is_active)
        .map(|r| (r.id.clone(), status(r, allocations, now, hours)))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AllocationStatus, BookingPaymentStatus};
    use chrono::TimeZone;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn bed(id: &str) -> Resource {
        let mut r = Resource::new(format!("Bed {}", id), at(0, 0));
        r.id = id.to_string();
        r
    }

    fn booking(
        id: &str,
        resource_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: AllocationStatus,
        payment_status: BookingPaymentStatus,
    ) -> Allocation {
        Allocation {
            id: id.to_string(),
            resource_id: resource_id.to_string(),
            customer_id: None,
            membership_package_id: None,
            booking_number: format!("BK-20260302-{}", id),
            window: TimeWindow::new(start, end).unwrap(),
            status,
            payment_status,
            total_amount_cents: 0,
            final_amount_cents: 0,
            notes: None,
            created_at: at(0, 0),
            updated_at: at(0, 0),
            deleted_at: None,
        }
    }

    fn paid_confirmed(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Allocation {
        booking(
            id,
            "bed-1",
            start,
            end,
            AllocationStatus::Confirmed,
            BookingPaymentStatus::Paid,
        )
    }

    #[test]
    fn test_conflicts_half_open() {
        let existing = vec![paid_confirmed("a", at(10, 0), at(11, 0))];

        let back_to_back = TimeWindow::new(at(11, 0), at(12, 0)).unwrap();
        assert!(conflicts(&existing, "bed-1", &back_to_back, None).is_empty());

        let before = TimeWindow::new(at(9, 0), at(10, 0)).unwrap();
        assert!(conflicts(&existing, "bed-1", &before, None).is_empty());

        let inside = TimeWindow::new(at(10, 15), at(10, 45)).unwrap();
        assert_eq!(conflicts(&existing, "bed-1", &inside, None).len(), 1);

        let other_bed = TimeWindow::new(at(10, 0), at(11, 0)).unwrap();
        assert!(conflicts(&existing, "bed-2", &other_bed, None).is_empty());
    }

    #[test]
    fn test_conflicts_ignore_cancelled_deleted_and_excluded() {
        let mut deleted = paid_confirmed("d", at(10, 0), at(11, 0));
        deleted.deleted_at = Some(at(9, 0));
        let existing = vec![
            booking(
                "c",
                "bed-1",
                at(10, 0),
                at(11, 0),
                AllocationStatus::Cancelled,
                BookingPaymentStatus::Paid,
            ),
            deleted,
            paid_confirmed("e", at(10, 0), at(11, 0)),
        ];
        let window = TimeWindow::new(at(10, 0), at(11, 0)).unwrap();

        let found = conflicts(&existing, "bed-1", &window, None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "e");

        assert!(conflicts(&existing, "bed-1", &window, Some("e")).is_empty());
    }

    #[test]
    fn test_unpaid_bookings_still_conflict() {
        let existing = vec![booking(
            "p",
            "bed-1",
            at(14, 0),
            at(15, 0),
            AllocationStatus::Pending,
            BookingPaymentStatus::Pending,
        )];
        let window = TimeWindow::new(at(14, 30), at(15, 30)).unwrap();
        assert_eq!(conflicts(&existing, "bed-1", &window, None).len(), 1);
    }

    #[test]
    fn test_check_booking_rejects_overlap() {
        let resource = bed("bed-1");
        let existing = vec![booking(
            "x",
            "bed-1",
            at(14, 0),
            at(15, 0),
            AllocationStatus::Confirmed,
            BookingPaymentStatus::Pending,
        )];
        let window = TimeWindow::new(at(14, 30), at(15, 30)).unwrap();

        let err = check_booking(&resource, &existing, &window, None).unwrap_err();
        match err {
            CoreError::Conflict {
                resource_id,
                conflicting,
            } => {
                assert_eq!(resource_id, "bed-1");
                assert_eq!(conflicting, vec!["x".to_string()]);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_check_booking_rejects_maintenance_and_bad_window() {
        let mut resource = bed("bed-1");
        let window = TimeWindow::new(at(9, 0), at(10, 0)).unwrap();
        assert!(check_booking(&resource, &[], &window, None).is_ok());

        let inverted = TimeWindow {
            start: at(10, 0),
            end: at(9, 0),
        };
        assert!(matches!(
            check_booking(&resource, &[], &inverted, None),
            Err(CoreError::Validation(ValidationError::InvalidWindow))
        ));

        resource.maintenance = true;
        assert!(matches!(
            check_booking(&resource, &[], &window, None),
            Err(CoreError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_status_precedence() {
        let hours = BusinessHours::default();
        let mut resource = bed("bed-1");
        let existing = vec![paid_confirmed("a", at(10, 0), at(11, 0))];

        assert_eq!(status(&resource, &existing, at(9, 0), &hours), ResourceStatus::Available);
        assert_eq!(status(&resource, &existing, at(9, 30), &hours), ResourceStatus::BookedSoon);
        assert_eq!(status(&resource, &existing, at(9, 45), &hours), ResourceStatus::BookedSoon);
        assert_eq!(status(&resource, &existing, at(10, 0), &hours), ResourceStatus::Occupied);
        assert_eq!(status(&resource, &existing, at(11, 0), &hours), ResourceStatus::Occupied);
        assert_eq!(status(&resource, &existing, at(11, 1), &hours), ResourceStatus::Available);

        resource.maintenance = true;
        assert_eq!(status(&resource, &existing, at(10, 30), &hours), ResourceStatus::Maintenance);
    }

    #[test]
    fn test_status_ignores_unpaid_and_pending() {
        let hours = BusinessHours::default();
        let resource = bed("bed-1");
        let existing = vec![
            booking(
                "unpaid",
                "bed-1",
                at(10, 0),
                at(11, 0),
                AllocationStatus::Confirmed,
                BookingPaymentStatus::Pending,
            ),
            booking(
                "draft",
                "bed-1",
                at(10, 0),
                at(11, 0),
                AllocationStatus::Pending,
                BookingPaymentStatus::Paid,
            ),
        ];
        assert_eq!(
            status(&resource, &existing, at(10, 30), &hours),
            ResourceStatus::Available
        );
    }

    #[test]
    fn test_candidate_slots_skip_booked_hour() {
        let hours = BusinessHours::default();
        let resource = bed("bed-1");
        let existing = vec![paid_confirmed("a", at(10, 0), at(11, 0))];

        let slots: Vec<TimeWindow> =
            candidate_slots(&resource, &existing, day(), 60, at(6, 0), &hours)
                .unwrap()
                .collect();

        let starts: Vec<DateTime<Utc>> = slots.iter().map(|s| s.start).collect();
        assert!(!starts.contains(&at(10, 0)));
        assert!(!starts.contains(&at(9, 30)));
        assert!(!starts.contains(&at(10, 30)));
        assert!(slots.contains(&TimeWindow::new(at(9, 0), at(10, 0)).unwrap()));
        assert!(slots.contains(&TimeWindow::new(at(11, 0), at(12, 0)).unwrap()));

        assert_eq!(slots.first().unwrap().start, at(8, 0));
        assert_eq!(slots.last().unwrap().end, at(22, 0));
        assert!(slots.windows(2).all(|w| w[0].start < w[1].start));
    }

    #[test]
    fn test_candidate_slots_respect_now_and_restart() {
        let hours = BusinessHours::default();
        let resource = bed("bed-1");

        let iter = candidate_slots(&resource, &[], day(), 30, at(20, 10), &hours).unwrap();
        let first_pass: Vec<_> = iter.clone().collect();
        let second_pass: Vec<_> = iter.collect();

        assert_eq!(first_pass, second_pass);
        let starts: Vec<_> = first_pass.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![at(20, 30), at(21, 0), at(21, 30)]);
    }

    #[test]
    fn test_candidate_slots_empty_under_maintenance() {
        let hours = BusinessHours::default();
        let mut resource = bed("bed-1");
        resource.maintenance = true;

        let mut slots = candidate_slots(&resource, &[], day(), 60, at(6, 0), &hours).unwrap();
        assert!(slots.next().is_none());
    }

    #[test]
    fn test_candidate_slots_reject_zero_duration() {
        let hours = BusinessHours::default();
        assert!(candidate_slots(&bed("b"), &[], day(), 0, at(6, 0), &hours).is_err());
    }

    #[test]
    fn test_business_hours_offset() {
        let hours = BusinessHours::new(
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            30,
            30,
            330,
        )
        .unwrap();

        // 08:00 at +05:30 is 02:30 UTC
        assert_eq!(hours.day_window(day()).start, at(2, 30));
        // 20:00 UTC on the 2nd is already the 3rd locally
        assert_eq!(
            hours.local_date(at(20, 0)),
            NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()
        );
    }

    #[test]
    fn test_business_hours_rejects_inverted() {
        let t = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
        assert!(BusinessHours::new(t(22), t(8), 30, 30, 0).is_err());
        assert!(BusinessHours::new(t(8), t(22), 0, 30, 0).is_err());
    }

    #[test]
    fn test_no_overlap_invariant_holds_for_accepted_bookings() {
        // Greedy booking through check_booking never yields overlapping pairs.
        let resource = bed("bed-1");
        let mut accepted: Vec<Allocation> = Vec::new();
        let requests = [
            (9, 0, 10, 0),
            (9, 30, 10, 30),
            (10, 0, 11, 0),
            (10, 45, 11, 15),
            (11, 0, 12, 30),
            (8, 0, 9, 0),
        ];
        for (i, (sh, sm, eh, em)) in requests.iter().enumerate() {
            let window = TimeWindow::new(at(*sh, *sm), at(*eh, *em)).unwrap();
            if check_booking(&resource, &accepted, &window, None).is_ok() {
                accepted.push(paid_confirmed(&i.to_string(), window.start, window.end));
            }
        }

        assert_eq!(accepted.len(), 4);
        for a in &accepted {
            for b in &accepted {
                if a.id != b.id {
                    assert!(!a.window.overlaps(&b.window));
                }
            }
        }
    }

    #[test]
    fn test_status_board_skips_inactive() {
        let hours = BusinessHours::default();
        let mut gone = bed("bed-2");
        gone.is_active = false;
        let board = status_board(&[bed("bed-1"), gone], &[], at(9, 0), &hours);
        assert_eq!(board, vec![("bed-1".to_string(), ResourceStatus::Available)]);
    }
}
