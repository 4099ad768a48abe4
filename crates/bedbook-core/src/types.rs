//! # Domain Types
//!
//! Core domain types used throughout Bedbook.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │    Resource     │   │   Allocation    │   │  MembershipPackage  │   │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────────  │   │
//! │  │  id (UUID)      │◄──│  resource_id    │   │  num_of_sessions    │   │
//! │  │  name           │   │  booking_number │   │  sessions_used      │   │
//! │  │  maintenance    │   │  window [s, e)  │   │  remaining_balance  │   │
//! │  └─────────────────┘   │  status         │   └─────────────────────┘   │
//! │                        └────────┬────────┘                              │
//! │                                 │ allocation_id (optional)              │
//! │  ┌─────────────────┐   ┌────────▼────────┐   ┌─────────────────┐       │
//! │  │    LineItem     │──►│     Invoice     │◄──│    Payment      │       │
//! │  │  item_type      │   │  invoice_number │   │  method         │       │
//! │  │  total_price    │   │  status         │   │  amount_cents   │       │
//! │  └─────────────────┘   │  parent_invoice │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (booking_number, invoice_number) - human-readable, day-scoped
//!
//! Behaviour lives next to the engine that owns it: invoice math in
//! [`crate::invoice`], membership math in [`crate::membership`], interval
//! logic in [`crate::availability`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

// =============================================================================
// Rate
// =============================================================================

/// A percentage represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 1000 bps = 10% and 10000 bps = 100%.
/// Used for invoice discount, service charge and tax, and for membership
/// package discounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// 100%.
    pub const MAX_BPS: u32 = 10_000;

    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        Rate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    /// Checks if rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

// =============================================================================
// Resource
// =============================================================================

/// A bookable bed or station.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Resource {
    pub id: String,
    pub name: String,
    /// Hard-blocks all scheduling while set.
    pub maintenance: bool,
    /// Soft delete flag.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    /// Creates a new, active resource that is not under maintenance.
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Resource {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            maintenance: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether new bookings may be placed on this resource at all.
    #[inline]
    pub fn is_schedulable(&self) -> bool {
        self.is_active && !self.maintenance
    }
}

// =============================================================================
// Time Window
// =============================================================================

/// A half-open interval `[start, end)`.
///
/// `end` is exclusive, so a window ending at 11:00 and one starting at 11:00
/// do not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TimeWindow {
    #[ts(as = "String")]
    pub start: DateTime<Utc>,
    #[ts(as = "String")]
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a window, rejecting `end <= start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> CoreResult<Self> {
        if end <= start {
            return Err(ValidationError::InvalidWindow.into());
        }
        Ok(TimeWindow { start, end })
    }

    /// Half-open overlap test: `a.start < b.end AND a.end > b.start`.
    #[inline]
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Length of the window in whole minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

// =============================================================================
// Allocation Status
// =============================================================================

/// Lifecycle of a booking.
///
/// ```text
/// pending ──► confirmed ──► in_progress ──► completed
///    │            │              │
///    └────────────┴──────────────┴──────► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl AllocationStatus {
    /// Returns the lowercase name used in storage and messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStatus::Pending => "pending",
            AllocationStatus::Confirmed => "confirmed",
            AllocationStatus::InProgress => "in_progress",
            AllocationStatus::Completed => "completed",
            AllocationStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: AllocationStatus) -> bool {
        use AllocationStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, InProgress)
                | (InProgress, Completed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (InProgress, Cancelled)
        )
    }
}

impl Default for AllocationStatus {
    fn default() -> Self {
        AllocationStatus::Pending
    }
}

/// Payment state of a booking (set by the orchestration layer when the
/// linked invoice is settled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BookingPaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl Default for BookingPaymentStatus {
    fn default() -> Self {
        BookingPaymentStatus::Pending
    }
}

// =============================================================================
// Allocation
// =============================================================================

/// A reservation of a resource for a half-open window.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Allocation {
    pub id: String,
    pub resource_id: String,
    pub customer_id: Option<String>,
    /// Package whose session pays for this booking, if any.
    pub membership_package_id: Option<String>,
    /// `BK-YYYYMMDD-NNNN`, unique per day.
    pub booking_number: String,
    pub window: TimeWindow,
    pub status: AllocationStatus,
    pub payment_status: BookingPaymentStatus,
    /// Price snapshot before discounts.
    pub total_amount_cents: i64,
    /// Price snapshot after discounts.
    pub final_amount_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// Set on deletion; removes the booking from scheduling.
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Allocation {
    /// Whether this allocation occupies its window for conflict purposes.
    #[inline]
    pub fn blocks_schedule(&self) -> bool {
        self.status != AllocationStatus::Cancelled && self.deleted_at.is_none()
    }

    /// Whether this allocation drives the displayed bed status
    /// (paid and confirmed or in progress).
    #[inline]
    pub fn drives_status(&self) -> bool {
        self.blocks_schedule()
            && self.payment_status == BookingPaymentStatus::Paid
            && matches!(
                self.status,
                AllocationStatus::Confirmed | AllocationStatus::InProgress
            )
    }

    /// Moves the booking along its lifecycle.
    pub fn transition(&mut self, next: AllocationStatus, at: DateTime<Utc>) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::invalid_state(
                "Allocation",
                &self.id,
                format!("cannot move from {} to {}", self.status.as_str(), next.as_str()),
            ));
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }

    /// Records that the booking has been paid for.
    pub fn mark_paid(&mut self, at: DateTime<Utc>) -> CoreResult<()> {
        if self.payment_status != BookingPaymentStatus::Pending {
            return Err(CoreError::invalid_state(
                "Allocation",
                &self.id,
                "payment already settled",
            ));
        }
        self.payment_status = BookingPaymentStatus::Paid;
        self.updated_at = at;
        Ok(())
    }

    /// Records a refund of a paid booking.
    pub fn mark_refunded(&mut self, at: DateTime<Utc>) -> CoreResult<()> {
        if self.payment_status != BookingPaymentStatus::Paid {
            return Err(CoreError::invalid_state(
                "Allocation",
                &self.id,
                "only paid bookings can be refunded",
            ));
        }
        self.payment_status = BookingPaymentStatus::Refunded;
        self.updated_at = at;
        Ok(())
    }

    /// Returns the final price snapshot as Money.
    #[inline]
    pub fn final_amount(&self) -> Money {
        Money::from_cents(self.final_amount_cents)
    }
}

/// Input for creating a booking. The booking number and id are assigned by
/// the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BookingRequest {
    pub resource_id: String,
    pub customer_id: Option<String>,
    pub membership_package_id: Option<String>,
    pub window: TimeWindow,
    pub total_amount_cents: i64,
    pub final_amount_cents: i64,
    pub notes: Option<String>,
}

// =============================================================================
// Invoice Status
// =============================================================================

/// Billing state machine.
///
/// ```text
/// draft ──► completed   (balance <= 0)
///   │
///   └─────► voided
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Completed,
    Voided,
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Draft
    }
}

/// Derived payment progress of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoicePaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl Default for InvoicePaymentStatus {
    fn default() -> Self {
        InvoicePaymentStatus::Unpaid
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// What kind of thing a line bills for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Package,
    Product,
    Service,
    Custom,
}

/// The catalog entry a line item is priced from.
///
/// Snapshot pattern: name and price are copied onto the line when it is
/// added, so later catalog edits do not rewrite billed history.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceSource {
    /// Catalog id (package, product, service). `None` for custom lines.
    pub source_id: Option<String>,
    pub name: String,
    pub unit_price_cents: i64,
}

impl PriceSource {
    /// A free-text line with an ad-hoc price.
    pub fn custom(name: impl Into<String>, unit_price_cents: i64) -> Self {
        PriceSource {
            source_id: None,
            name: name.into(),
            unit_price_cents,
        }
    }
}

/// A billable line on an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LineItem {
    pub id: String,
    pub invoice_id: String,
    pub item_type: ItemType,
    pub source_id: Option<String>,
    /// Name at time of billing (frozen).
    pub name: String,
    pub quantity: i64,
    /// Unit price in cents at time of billing (frozen).
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    /// `quantity × unit_price − discount`.
    pub total_price_cents: i64,
    /// Position in the invoice.
    pub position: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LineItem {
    /// Returns the line total as Money.
    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }
}

// =============================================================================
// Payment
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Upi,
    BankTransfer,
    Other,
}

impl PaymentMethod {
    /// Parses the storage/API name of a method.
    pub fn parse(s: &str) -> CoreResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "upi" => Ok(PaymentMethod::Upi),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "other" => Ok(PaymentMethod::Other),
            _ => Err(ValidationError::InvalidFormat {
                field: "payment_method".to_string(),
                reason: format!("unknown method '{}'", s),
            }
            .into()),
        }
    }
}

/// A payment record is atomic: it exists only once it has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Completed,
}

/// A payment towards an invoice.
/// An invoice can have multiple payments for split tender scenarios.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub invoice_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    /// External reference (card auth code, UPI transaction id, ...).
    pub reference: Option<String>,
    pub status: PaymentStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// A bill for a booking, a customer, or an add-on to another invoice.
///
/// Derived fields (`subtotal_cents` .. `payment_status`) are a cache written
/// only by [`Invoice::recompute`](crate::invoice).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    /// `INV-YYYYMMDD-NNNN`, unique per day.
    pub invoice_number: String,
    pub customer_id: Option<String>,
    pub allocation_id: Option<String>,
    pub parent_invoice_id: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub items: Vec<LineItem>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub payments: Vec<Payment>,

    // Charge inputs as entered. A non-zero rate wins over the entered amount.
    pub discount_bps: u32,
    pub discount_cents: i64,
    pub service_charge_bps: u32,
    pub service_charge_cents: i64,
    pub tax_bps: u32,
    pub tax_cents: i64,
    pub additional_charges_cents: i64,

    // Derived.
    pub subtotal_cents: i64,
    pub applied_discount_cents: i64,
    pub applied_service_charge_cents: i64,
    pub applied_tax_cents: i64,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub balance_cents: i64,
    pub payment_status: InvoicePaymentStatus,

    pub status: InvoiceStatus,
    pub completed_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped on every save.
    pub version: i64,
}

impl Invoice {
    /// Returns the grand total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Returns the outstanding balance as Money (negative means credit).
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }

    /// Whether items, charges and payments may still change.
    #[inline]
    pub fn is_draft(&self) -> bool {
        self.status == InvoiceStatus::Draft
    }
}

// =============================================================================
// Membership Package
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Inactive,
    Expired,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Inactive => "inactive",
            MembershipStatus::Expired => "expired",
        }
    }
}

impl Default for MembershipStatus {
    fn default() -> Self {
        MembershipStatus::Active
    }
}

/// A prepaid bundle of sessions and money a customer draws down.
///
/// `remaining_balance_cents` is a cache written only by
/// [`MembershipPackage::recompute_balance`](crate::membership).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct MembershipPackage {
    pub id: String,
    pub customer_id: Option<String>,
    pub name: String,
    pub num_of_sessions: i64,
    pub sessions_used: i64,
    pub discount_bps: u32,
    pub full_payment_cents: i64,
    pub advance_payment_cents: i64,
    pub remaining_balance_cents: i64,
    pub status: MembershipStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    #[test]
    fn test_rate_from_percentage() {
        let rate = Rate::from_percentage(8.25);
        assert_eq!(rate.bps(), 825);
        assert!((rate.percentage() - 8.25).abs() < 0.001);
    }

    #[test]
    fn test_time_window_rejects_empty() {
        assert!(TimeWindow::new(at(10, 0), at(10, 0)).is_err());
        assert!(TimeWindow::new(at(11, 0), at(10, 0)).is_err());
        assert_eq!(TimeWindow::new(at(10, 0), at(11, 30)).unwrap().duration_minutes(), 90);
    }

    #[test]
    fn test_back_to_back_windows_do_not_overlap() {
        let first = TimeWindow::new(at(10, 0), at(11, 0)).unwrap();
        let second = TimeWindow::new(at(11, 0), at(12, 0)).unwrap();
        let straddle = TimeWindow::new(at(10, 30), at(11, 30)).unwrap();

        assert!(!first.overlaps(&second));
        assert!(!second.overlaps(&first));
        assert!(first.overlaps(&straddle));
        assert!(straddle.overlaps(&second));
    }

    #[test]
    fn test_allocation_status_transitions() {
        use AllocationStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!(PaymentMethod::parse("UPI").unwrap(), PaymentMethod::Upi);
        assert_eq!(
            PaymentMethod::parse("bank_transfer").unwrap(),
            PaymentMethod::BankTransfer
        );
        assert!(PaymentMethod::parse("cheque").is_err());
    }

    #[test]
    fn test_status_defaults() {
        assert_eq!(AllocationStatus::default(), AllocationStatus::Pending);
        assert_eq!(InvoiceStatus::default(), InvoiceStatus::Draft);
        assert_eq!(MembershipStatus::default(), MembershipStatus::Active);
    }
}
