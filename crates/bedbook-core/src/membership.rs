//! # Membership Ledger
//!
//! Session and money balance of prepaid packages.
//!
//! ## Balance
//! ```text
//! discounted_price  = full_payment − full_payment × discount%
//! remaining_balance = discounted_price − advance_payment
//! ```
//!
//! ## Lifecycle
//! ```text
//! active ◄──► inactive
//!   │            │
//!   └─────┬──────┘
//!         ▼
//!      expired   (last session used, or set manually; terminal)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{MembershipPackage, MembershipStatus, Rate};
use crate::validation::{
    validate_name, validate_non_negative, validate_payment_amount, validate_rate_bps,
    validate_session_count,
};

/// Input for selling a new package.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPackage {
    pub customer_id: Option<String>,
    pub name: String,
    pub num_of_sessions: i64,
    pub discount_bps: u32,
    pub full_payment_cents: i64,
    pub advance_payment_cents: i64,
}

impl MembershipPackage {
    /// Creates an active package with no sessions used.
    pub fn new(input: NewPackage, now: DateTime<Utc>) -> CoreResult<Self> {
        validate_name("name", &input.name)?;
        validate_session_count(input.num_of_sessions)?;
        let rate = validate_rate_bps(input.discount_bps)?;
        validate_non_negative("full_payment", input.full_payment_cents)?;
        validate_non_negative("advance_payment", input.advance_payment_cents)?;

        let price = Money::from_cents(input.full_payment_cents).apply_percentage_discount(rate);
        if input.advance_payment_cents > price.cents() {
            return Err(ValidationError::ExceedsBalance {
                field: "advance_payment".to_string(),
                amount: input.advance_payment_cents,
                outstanding: price.cents(),
            }
            .into());
        }

        let mut package = MembershipPackage {
            id: uuid::Uuid::new_v4().to_string(),
            customer_id: input.customer_id,
            name: input.name.trim().to_string(),
            num_of_sessions: input.num_of_sessions,
            sessions_used: 0,
            discount_bps: input.discount_bps,
            full_payment_cents: input.full_payment_cents,
            advance_payment_cents: input.advance_payment_cents,
            remaining_balance_cents: 0,
            status: MembershipStatus::Active,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        package.recompute_balance();
        Ok(package)
    }

    /// Price after the package discount.
    pub fn discounted_price(&self) -> Money {
        Money::from_cents(self.full_payment_cents)
            .apply_percentage_discount(Rate::from_bps(self.discount_bps))
    }

    /// Rewrites `remaining_balance_cents` from its three inputs.
    pub fn recompute_balance(&mut self) {
        self.remaining_balance_cents =
            (self.discounted_price() - Money::from_cents(self.advance_payment_cents)).cents();
    }

    /// Returns the money still owed as Money.
    #[inline]
    pub fn remaining_balance(&self) -> Money {
        Money::from_cents(self.remaining_balance_cents)
    }

    /// Active and not yet exhausted.
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active && self.sessions_used < self.num_of_sessions
    }

    pub fn sessions_remaining(&self) -> i64 {
        (self.num_of_sessions - self.sessions_used).max(0)
    }

    /// Consumes one session. The package expires when the last one is used.
    pub fn use_session(&mut self, at: DateTime<Utc>) -> CoreResult<()> {
        if !self.is_active() {
            return Err(CoreError::invalid_state(
                "MembershipPackage",
                &self.id,
                "inactive or exhausted",
            ));
        }

        self.sessions_used += 1;
        if self.sessions_used >= self.num_of_sessions {
            self.status = MembershipStatus::Expired;
        }
        self.updated_at = at;
        Ok(())
    }

    /// Records money paid towards the remaining balance.
    pub fn settle_payment(&mut self, amount_cents: i64, at: DateTime<Utc>) -> CoreResult<()> {
        validate_payment_amount(amount_cents)?;
        if amount_cents > self.remaining_balance_cents {
            return Err(ValidationError::ExceedsBalance {
                field: "settlement".to_string(),
                amount: amount_cents,
                outstanding: self.remaining_balance_cents,
            }
            .into());
        }

        self.advance_payment_cents += amount_cents;
        self.recompute_balance();
        self.updated_at = at;
        Ok(())
    }

    /// Changes the full price and/or discount. Fails if the money already
    /// paid would exceed the new discounted price.
    pub fn reprice(
        &mut self,
        full_payment_cents: Option<i64>,
        discount_bps: Option<u32>,
        at: DateTime<Utc>,
    ) -> CoreResult<()> {
        let full = full_payment_cents.unwrap_or(self.full_payment_cents);
        let bps = discount_bps.unwrap_or(self.discount_bps);
        validate_non_negative("full_payment", full)?;
        let rate = validate_rate_bps(bps)?;

        let price = Money::from_cents(full).apply_percentage_discount(rate);
        if self.advance_payment_cents > price.cents() {
            return Err(ValidationError::ExceedsBalance {
                field: "advance_payment".to_string(),
                amount: self.advance_payment_cents,
                outstanding: price.cents(),
            }
            .into());
        }

        self.full_payment_cents = full;
        self.discount_bps = bps;
        self.recompute_balance();
        self.updated_at = at;
        Ok(())
    }

    /// Manual status change from the front desk.
    pub fn set_status(&mut self, next: MembershipStatus, at: DateTime<Utc>) -> CoreResult<()> {
        if self.status == next {
            return Ok(());
        }
        if self.status == MembershipStatus::Expired {
            return Err(CoreError::invalid_state(
                "MembershipPackage",
                &self.id,
                format!("cannot move from expired to {}", next.as_str()),
            ));
        }

        self.status = next;
        self.updated_at = at;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    fn package(sessions: i64, discount_bps: u32, full: i64, advance: i64) -> MembershipPackage {
        MembershipPackage::new(
            NewPackage {
                customer_id: Some("cust-1".to_string()),
                name: "10 Massages".to_string(),
                num_of_sessions: sessions,
                discount_bps,
                full_payment_cents: full,
                advance_payment_cents: advance,
            },
            now(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_package_balance() {
        let pkg = package(10, 1000, 100_000, 20_000);
        assert_eq!(pkg.sessions_used, 0);
        assert_eq!(pkg.status, MembershipStatus::Active);
        // 1000.00 − 10% − 200.00 = 700.00
        assert_eq!(pkg.remaining_balance_cents, 70_000);
        assert_eq!(pkg.sessions_remaining(), 10);
    }

    #[test]
    fn test_new_package_validation() {
        let base = NewPackage {
            customer_id: None,
            name: "Pack".to_string(),
            num_of_sessions: 5,
            discount_bps: 0,
            full_payment_cents: 10_000,
            advance_payment_cents: 0,
        };

        let zero_sessions = NewPackage {
            num_of_sessions: 0,
            ..base.clone()
        };
        assert!(MembershipPackage::new(zero_sessions, now()).is_err());

        let big_discount = NewPackage {
            discount_bps: 10_001,
            ..base.clone()
        };
        assert!(MembershipPackage::new(big_discount, now()).is_err());

        let over_advance = NewPackage {
            discount_bps: 5000,
            advance_payment_cents: 5001,
            ..base.clone()
        };
        assert!(MembershipPackage::new(over_advance, now()).is_err());

        assert!(MembershipPackage::new(base, now()).is_ok());
    }

    #[test]
    fn test_scenario_d_exhaustion() {
        let mut pkg = package(5, 0, 0, 0);
        pkg.sessions_used = 4;

        pkg.use_session(now()).unwrap();
        assert_eq!(pkg.sessions_used, 5);
        assert_eq!(pkg.status, MembershipStatus::Expired);
        assert!(!pkg.is_active());

        let err = pkg.use_session(now()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
        assert_eq!(pkg.sessions_used, 5);
    }

    #[test]
    fn test_inactive_package_rejects_sessions() {
        let mut pkg = package(3, 0, 0, 0);
        pkg.set_status(MembershipStatus::Inactive, now()).unwrap();
        assert!(pkg.use_session(now()).is_err());

        pkg.set_status(MembershipStatus::Active, now()).unwrap();
        pkg.use_session(now()).unwrap();
        assert_eq!(pkg.sessions_remaining(), 2);
    }

    #[test]
    fn test_settle_payment() {
        let mut pkg = package(10, 1000, 100_000, 20_000);

        assert!(pkg.settle_payment(0, now()).is_err());
        assert!(matches!(
            pkg.settle_payment(70_001, now()),
            Err(CoreError::Validation(ValidationError::ExceedsBalance { .. }))
        ));
        assert_eq!(pkg.advance_payment_cents, 20_000);

        pkg.settle_payment(30_000, now()).unwrap();
        assert_eq!(pkg.advance_payment_cents, 50_000);
        assert_eq!(pkg.remaining_balance_cents, 40_000);

        pkg.settle_payment(40_000, now()).unwrap();
        assert!(pkg.remaining_balance().is_zero());
    }

    #[test]
    fn test_balance_formula_holds_after_every_mutation() {
        let mut pkg = package(8, 1250, 64_000, 1_000);
        let check = |p: &MembershipPackage| {
            let discounted = p.full_payment_cents
                - Money::from_cents(p.full_payment_cents)
                    .percent_of(Rate::from_bps(p.discount_bps))
                    .cents();
            assert_eq!(p.remaining_balance_cents, discounted - p.advance_payment_cents);
        };

        check(&pkg);
        pkg.settle_payment(7_000, now()).unwrap();
        check(&pkg);
        pkg.reprice(Some(80_000), None, now()).unwrap();
        check(&pkg);
        pkg.reprice(None, Some(0), now()).unwrap();
        check(&pkg);
        pkg.use_session(now()).unwrap();
        check(&pkg);
    }

    #[test]
    fn test_reprice_rejects_negative_balance() {
        let mut pkg = package(4, 0, 10_000, 8_000);
        assert!(pkg.reprice(None, Some(5000), now()).is_err());
        assert_eq!(pkg.discount_bps, 0);
        assert_eq!(pkg.remaining_balance_cents, 2_000);
    }

    #[test]
    fn test_expired_is_terminal() {
        let mut pkg = package(2, 0, 0, 0);
        pkg.set_status(MembershipStatus::Expired, now()).unwrap();
        assert!(pkg.set_status(MembershipStatus::Active, now()).is_err());
        assert!(pkg.set_status(MembershipStatus::Inactive, now()).is_err());
        assert!(pkg.set_status(MembershipStatus::Expired, now()).is_ok());
    }
}
