//! # Invoice Engine
//!
//! Line items, charges, payments and the billing state machine.
//!
//! ## Totals Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        recompute()                                      │
//! │                                                                         │
//! │  Σ line.total_price ─────────────────────────────► subtotal            │
//! │  subtotal × discount%      (or entered amount)  ─► discount            │
//! │  subtotal − discount ────────────────────────────► after_discount      │
//! │  after_discount × service% (or entered amount)  ─► service_charge      │
//! │  after_discount + service_charge ────────────────► taxable             │
//! │  taxable × tax%            (or entered amount)  ─► tax                 │
//! │  taxable + tax + additional_charges ─────────────► total               │
//! │  Σ completed payments ───────────────────────────► paid                │
//! │  total − paid ───────────────────────────────────► balance             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## State Machine
//! ```text
//! draft ──mark_completed (balance <= 0)──► completed
//!   │
//!   └──────────void──────────────────────► voided
//! ```
//!
//! Every mutator validates first and recomputes last, so derived fields are
//! always consistent with items and payments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{
    Invoice, InvoicePaymentStatus, InvoiceStatus, ItemType, LineItem, Payment, PaymentMethod,
    PaymentStatus, PriceSource, Rate,
};
use crate::validation::{
    validate_name, validate_non_negative, validate_payment_amount, validate_price_cents,
    validate_quantity, validate_rate_bps,
};

/// What to do with a payment larger than the outstanding balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverpaymentPolicy {
    /// Accept it; the balance goes negative and reads as customer credit.
    #[default]
    Allow,
    /// Refuse anything above the outstanding balance.
    Reject,
}

/// Partial update of the invoice-level charge inputs. `None` keeps the
/// current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChargeInputs {
    pub discount_bps: Option<u32>,
    pub discount_cents: Option<i64>,
    pub service_charge_bps: Option<u32>,
    pub service_charge_cents: Option<i64>,
    pub tax_bps: Option<u32>,
    pub tax_cents: Option<i64>,
    pub additional_charges_cents: Option<i64>,
}

impl Invoice {
    /// Creates an empty draft invoice.
    pub fn draft(
        invoice_number: impl Into<String>,
        customer_id: Option<String>,
        allocation_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Invoice {
            id: uuid::Uuid::new_v4().to_string(),
            invoice_number: invoice_number.into(),
            customer_id,
            allocation_id,
            parent_invoice_id: None,
            items: Vec::new(),
            payments: Vec::new(),
            discount_bps: 0,
            discount_cents: 0,
            service_charge_bps: 0,
            service_charge_cents: 0,
            tax_bps: 0,
            tax_cents: 0,
            additional_charges_cents: 0,
            subtotal_cents: 0,
            applied_discount_cents: 0,
            applied_service_charge_cents: 0,
            applied_tax_cents: 0,
            total_cents: 0,
            paid_cents: 0,
            balance_cents: 0,
            payment_status: InvoicePaymentStatus::Unpaid,
            status: InvoiceStatus::Draft,
            completed_by: None,
            completed_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Creates a draft add-on invoice for extras billed after `parent`.
    ///
    /// The add-on inherits the parent's customer and booking.
    pub fn add_on(parent: &Invoice, invoice_number: impl Into<String>, now: DateTime<Utc>) -> CoreResult<Self> {
        if parent.status == InvoiceStatus::Voided {
            return Err(CoreError::invalid_state(
                "Invoice",
                &parent.id,
                "cannot add on to a voided invoice",
            ));
        }
        let mut add_on = Invoice::draft(
            invoice_number,
            parent.customer_id.clone(),
            parent.allocation_id.clone(),
            now,
        );
        add_on.parent_invoice_id = Some(parent.id.clone());
        Ok(add_on)
    }

    fn ensure_draft(&self, action: &str) -> CoreResult<()> {
        if !self.is_draft() {
            return Err(CoreError::invalid_state(
                "Invoice",
                &self.id,
                format!("cannot {} once {}", action, status_name(self.status)),
            ));
        }
        Ok(())
    }

    // =========================================================================
    // Line Items
    // =========================================================================

    /// Appends a line priced from `source`.
    pub fn add_item(
        &mut self,
        item_type: ItemType,
        source: &PriceSource,
        quantity: i64,
        at: DateTime<Utc>,
    ) -> CoreResult<LineItem> {
        self.ensure_draft("add items")?;
        validate_quantity(quantity)?;
        validate_price_cents(source.unit_price_cents)?;
        validate_name("name", &source.name)?;
        let total = line_total(source.unit_price_cents, quantity)?;

        self.stage(at, |inv| {
            let position = inv.items.iter().map(|i| i.position).max().unwrap_or(0) + 1;
            let item = LineItem {
                id: uuid::Uuid::new_v4().to_string(),
                invoice_id: inv.id.clone(),
                item_type,
                source_id: source.source_id.clone(),
                name: source.name.trim().to_string(),
                quantity,
                unit_price_cents: source.unit_price_cents,
                discount_cents: 0,
                total_price_cents: total.cents(),
                position,
                created_at: at,
            };
            inv.items.push(item.clone());
            Ok(item)
        })
    }

    /// Removes a line.
    pub fn remove_item(&mut self, item_id: &str, at: DateTime<Utc>) -> CoreResult<LineItem> {
        self.ensure_draft("remove items")?;
        self.stage(at, |inv| {
            let index = inv
                .items
                .iter()
                .position(|i| i.id == item_id)
                .ok_or_else(|| CoreError::not_found("LineItem", item_id))?;
            Ok(inv.items.remove(index))
        })
    }

    /// Replaces quantity, unit price and line discount of a line.
    pub fn update_item(
        &mut self,
        item_id: &str,
        quantity: i64,
        unit_price_cents: i64,
        discount_cents: i64,
        at: DateTime<Utc>,
    ) -> CoreResult<LineItem> {
        self.ensure_draft("update items")?;
        validate_quantity(quantity)?;
        validate_price_cents(unit_price_cents)?;
        validate_non_negative("discount", discount_cents)?;

        let gross = line_total(unit_price_cents, quantity)?;
        if discount_cents > gross.cents() {
            return Err(ValidationError::OutOfRange {
                field: "discount".to_string(),
                min: 0,
                max: gross.cents(),
            }
            .into());
        }

        self.stage(at, |inv| {
            let item = inv
                .items
                .iter_mut()
                .find(|i| i.id == item_id)
                .ok_or_else(|| CoreError::not_found("LineItem", item_id))?;
            item.quantity = quantity;
            item.unit_price_cents = unit_price_cents;
            item.discount_cents = discount_cents;
            item.total_price_cents = (gross - Money::from_cents(discount_cents)).cents();
            Ok(item.clone())
        })
    }

    // =========================================================================
    // Charges
    // =========================================================================

    /// Updates discount, service charge, tax and additional charges.
    ///
    /// The amounts are stored as entered; `recompute` decides whether the
    /// rate or the amount applies.
    pub fn set_charges(&mut self, inputs: &ChargeInputs, at: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_draft("change charges")?;

        for bps in [inputs.discount_bps, inputs.service_charge_bps, inputs.tax_bps]
            .into_iter()
            .flatten()
        {
            validate_rate_bps(bps)?;
        }
        let amounts = [
            ("discount", inputs.discount_cents),
            ("service_charge", inputs.service_charge_cents),
            ("tax", inputs.tax_cents),
            ("additional_charges", inputs.additional_charges_cents),
        ];
        for (field, cents) in amounts {
            if let Some(cents) = cents {
                validate_non_negative(field, cents)?;
            }
        }

        self.stage(at, |inv| {
            if let Some(v) = inputs.discount_bps {
                inv.discount_bps = v;
            }
            if let Some(v) = inputs.discount_cents {
                inv.discount_cents = v;
            }
            if let Some(v) = inputs.service_charge_bps {
                inv.service_charge_bps = v;
            }
            if let Some(v) = inputs.service_charge_cents {
                inv.service_charge_cents = v;
            }
            if let Some(v) = inputs.tax_bps {
                inv.tax_bps = v;
            }
            if let Some(v) = inputs.tax_cents {
                inv.tax_cents = v;
            }
            if let Some(v) = inputs.additional_charges_cents {
                inv.additional_charges_cents = v;
            }
            Ok(())
        })
    }

    // =========================================================================
    // Recompute
    // =========================================================================

    /// Rebuilds every derived field from items, charge inputs and payments.
    ///
    /// Deterministic and idempotent. A non-zero rate drives the applied
    /// amount; a zero rate applies the entered amount. Entered amounts are
    /// never overwritten. On overflow nothing is written.
    pub fn recompute(&mut self) -> CoreResult<()> {
        let totals = self.totals()?;

        self.subtotal_cents = totals.subtotal.cents();
        self.applied_discount_cents = totals.discount.cents();
        self.applied_service_charge_cents = totals.service_charge.cents();
        self.applied_tax_cents = totals.tax.cents();
        self.total_cents = totals.total.cents();
        self.paid_cents = totals.paid.cents();
        self.balance_cents = totals.balance.cents();
        self.payment_status = if totals.paid.cents() <= 0 {
            InvoicePaymentStatus::Unpaid
        } else if totals.paid >= totals.total {
            InvoicePaymentStatus::Paid
        } else {
            InvoicePaymentStatus::Partial
        };
        Ok(())
    }

    fn totals(&self) -> CoreResult<Totals> {
        let subtotal = checked_sum("subtotal", self.items.iter().map(LineItem::total_price))?;

        let discount = applied(subtotal, self.discount_bps, self.discount_cents);
        let after_discount = subtotal
            .checked_sub(discount)
            .ok_or_else(|| overflow("subtotal"))?;

        let service_charge =
            applied(after_discount, self.service_charge_bps, self.service_charge_cents);
        let taxable = after_discount
            .checked_add(service_charge)
            .ok_or_else(|| overflow("service_charge"))?;

        let tax = applied(taxable, self.tax_bps, self.tax_cents);
        let total = taxable
            .checked_add(tax)
            .and_then(|t| t.checked_add(Money::from_cents(self.additional_charges_cents)))
            .ok_or_else(|| overflow("total"))?;

        let paid = checked_sum(
            "paid",
            self.payments
                .iter()
                .filter(|p| p.status == PaymentStatus::Completed)
                .map(Payment::amount),
        )?;
        let balance = total.checked_sub(paid).ok_or_else(|| overflow("balance"))?;

        Ok(Totals {
            subtotal,
            discount,
            service_charge,
            tax,
            total,
            paid,
            balance,
        })
    }

    /// Applies `change` to a copy, recomputes it and keeps it only if both
    /// succeed.
    fn stage<T>(
        &mut self,
        at: DateTime<Utc>,
        change: impl FnOnce(&mut Invoice) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let mut next = self.clone();
        let out = change(&mut next)?;
        next.recompute()?;
        next.updated_at = at;
        *self = next;
        Ok(out)
    }

    // =========================================================================
    // Payments & Lifecycle
    // =========================================================================

    /// Records a completed payment.
    pub fn add_payment(
        &mut self,
        amount_cents: i64,
        method: PaymentMethod,
        reference: Option<String>,
        policy: OverpaymentPolicy,
        at: DateTime<Utc>,
    ) -> CoreResult<Payment> {
        validate_payment_amount(amount_cents)?;
        self.ensure_draft("take payments")?;

        let outstanding = self.balance_cents.max(0);
        if policy == OverpaymentPolicy::Reject && amount_cents > outstanding {
            return Err(ValidationError::ExceedsBalance {
                field: "payment".to_string(),
                amount: amount_cents,
                outstanding,
            }
            .into());
        }

        self.stage(at, |inv| {
            let payment = Payment {
                id: uuid::Uuid::new_v4().to_string(),
                invoice_id: inv.id.clone(),
                method,
                amount_cents,
                reference: reference.filter(|r| !r.trim().is_empty()),
                status: PaymentStatus::Completed,
                created_at: at,
            };
            inv.payments.push(payment.clone());
            Ok(payment)
        })
    }

    /// Closes a fully paid draft.
    pub fn mark_completed(&mut self, actor: impl Into<String>, at: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_draft("complete")?;
        self.recompute()?;
        if self.balance_cents > 0 {
            return Err(CoreError::invalid_state(
                "Invoice",
                &self.id,
                format!("balance of {} outstanding", self.balance()),
            ));
        }

        self.status = InvoiceStatus::Completed;
        self.payment_status = InvoicePaymentStatus::Paid;
        self.completed_by = Some(actor.into());
        self.completed_at = Some(at);
        self.updated_at = at;
        Ok(())
    }

    /// Cancels a draft.
    pub fn void(&mut self, at: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_draft("void")?;
        self.status = InvoiceStatus::Voided;
        self.updated_at = at;
        Ok(())
    }
}

/// Derived amounts of one recompute pass.
struct Totals {
    subtotal: Money,
    discount: Money,
    service_charge: Money,
    tax: Money,
    total: Money,
    paid: Money,
    balance: Money,
}

/// A non-zero rate over `base`, else the entered amount.
fn applied(base: Money, bps: u32, entered_cents: i64) -> Money {
    if bps > 0 {
        base.percent_of(Rate::from_bps(bps))
    } else {
        Money::from_cents(entered_cents)
    }
}

fn line_total(unit_price_cents: i64, quantity: i64) -> CoreResult<Money> {
    Money::from_cents(unit_price_cents)
        .checked_mul_quantity(quantity)
        .ok_or_else(|| overflow("total_price"))
}

fn checked_sum(field: &str, mut amounts: impl Iterator<Item = Money>) -> CoreResult<Money> {
    amounts
        .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
        .ok_or_else(|| overflow(field))
}

fn overflow(field: &str) -> CoreError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: i64::MIN,
        max: i64::MAX,
    }
    .into()
}

fn status_name(status: InvoiceStatus) -> &'static str {
    match status {
        InvoiceStatus::Draft => "draft",
        InvoiceStatus::Completed => "completed",
        InvoiceStatus::Voided => "voided",
    }
}

/// Outstanding balance of a parent invoice together with its add-ons.
/// Voided invoices count as zero.
pub fn combined_balance(parent: &Invoice, add_ons: &[Invoice]) -> Money {
    std::iter::once(parent)
        .chain(
            add_ons
                .iter()
                .filter(|a| a.parent_invoice_id.as_deref() == Some(parent.id.as_str())),
        )
        .filter(|i| i.status != InvoiceStatus::Voided)
        .map(Invoice::balance)
        .sum()
}

// =============================================================================
// Unit Tests
// =============================================================================
