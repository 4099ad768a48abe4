//! # Billing Commands
//!
//! Invoices, their lines, charges and payments.
//!
//! ## Invoice Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  open_invoice(booking) ──► add_line / update_line / remove_line        │
//! │        │                         │                                      │
//! │        │                   set_charges (discount, service, tax)        │
//! │        │                         │                                      │
//! │        │                   record_payment (cash, card, upi, ...)       │
//! │        │                         │                                      │
//! │        │                   complete_invoice ──► booking marked paid    │
//! │        │                                                                │
//! │        └──► open_add_on (extras after the fact, same booking)          │
//! │                                                                         │
//! │  void_invoice: draft only                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation is one `update_with` round trip: the repository loads the
//! aggregate, the engine operation runs and recomputes, and the result is
//! written back under the version guard.

use bedbook_core::invoice::combined_balance;
use bedbook_core::{
    BookingPaymentStatus, ChargeInputs, Invoice, InvoicePaymentStatus, ItemType, LineItem,
    Payment, PaymentMethod, PriceSource,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiResult;
use crate::state::FrontDesk;

/// Input for [`open_invoice`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInvoiceInput {
    /// Booking being billed. Its customer is used when `customer_id` is empty.
    pub booking_id: Option<String>,
    pub customer_id: Option<String>,
    /// Add the booking's final price as the first package line.
    #[serde(default)]
    pub bill_booking: bool,
}

/// Result of [`record_payment`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub payment: Payment,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub balance_cents: i64,
    pub payment_status: InvoicePaymentStatus,
    /// Display form of the balance, e.g. `$4.90`.
    pub balance_display: String,
}

/// An invoice together with its add-ons.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSummary {
    pub invoice: Invoice,
    pub add_ons: Vec<Invoice>,
    /// Outstanding over the invoice and its non-voided add-ons.
    pub combined_balance_cents: i64,
    pub combined_balance_display: String,
}

pub async fn open_invoice(desk: &FrontDesk, input: OpenInvoiceInput) -> ApiResult<Invoice> {
    debug!(booking_id = ?input.booking_id, "open_invoice command");

    let now = desk.now();
    let booking = match &input.booking_id {
        Some(id) => Some(desk.db().allocations().get(id).await?),
        None => None,
    };
    let customer_id = input
        .customer_id
        .or_else(|| booking.as_ref().and_then(|b| b.customer_id.clone()));

    let invoice = desk
        .db()
        .invoices()
        .create_with(desk.business_day(now), |number| {
            let mut invoice = Invoice::draft(number, customer_id, input.booking_id.clone(), now);
            if let (true, Some(booking)) = (input.bill_booking, &booking) {
                let source = PriceSource {
                    source_id: Some(booking.id.clone()),
                    name: format!("Booking {}", booking.booking_number),
                    unit_price_cents: booking.final_amount_cents,
                };
                invoice.add_item(ItemType::Package, &source, 1, now)?;
            }
            Ok(invoice)
        })
        .await?;

    info!(
        invoice_id = %invoice.id,
        invoice_number = %invoice.invoice_number,
        total = invoice.total_cents,
        "Invoice opened"
    );
    Ok(invoice)
}

/// Opens a draft add-on under `parent_id` for extras billed later.
pub async fn open_add_on(desk: &FrontDesk, parent_id: &str) -> ApiResult<Invoice> {
    debug!(parent_id = %parent_id, "open_add_on command");

    let now = desk.now();
    let invoices = desk.db().invoices();
    let parent = invoices.get(parent_id).await?;
    let add_on = invoices
        .create_with(desk.business_day(now), |number| {
            Invoice::add_on(&parent, number, now)
        })
        .await?;

    info!(
        invoice_id = %add_on.id,
        parent_id = %parent_id,
        invoice_number = %add_on.invoice_number,
        "Add-on invoice opened"
    );
    Ok(add_on)
}

pub async fn add_line(
    desk: &FrontDesk,
    invoice_id: &str,
    item_type: ItemType,
    source: PriceSource,
    quantity: i64,
) -> ApiResult<LineItem> {
    debug!(invoice_id = %invoice_id, name = %source.name, quantity, "add_line command");

    let now = desk.now();
    let (invoice, item) = desk
        .db()
        .invoices()
        .update_with(invoice_id, |inv| inv.add_item(item_type, &source, quantity, now))
        .await?;

    info!(invoice_id = %invoice_id, item_id = %item.id, total = invoice.total_cents, "Line added");
    Ok(item)
}

pub async fn update_line(
    desk: &FrontDesk,
    invoice_id: &str,
    item_id: &str,
    quantity: i64,
    unit_price_cents: i64,
    discount_cents: i64,
) -> ApiResult<LineItem> {
    debug!(invoice_id = %invoice_id, item_id = %item_id, "update_line command");

    let now = desk.now();
    let (invoice, item) = desk
        .db()
        .invoices()
        .update_with(invoice_id, |inv| {
            inv.update_item(item_id, quantity, unit_price_cents, discount_cents, now)
        })
        .await?;

    info!(invoice_id = %invoice_id, item_id = %item_id, total = invoice.total_cents, "Line updated");
    Ok(item)
}

pub async fn remove_line(desk: &FrontDesk, invoice_id: &str, item_id: &str) -> ApiResult<Invoice> {
    debug!(invoice_id = %invoice_id, item_id = %item_id, "remove_line command");

    let now = desk.now();
    let (invoice, _) = desk
        .db()
        .invoices()
        .update_with(invoice_id, |inv| inv.remove_item(item_id, now))
        .await?;

    info!(invoice_id = %invoice_id, item_id = %item_id, total = invoice.total_cents, "Line removed");
    Ok(invoice)
}

pub async fn set_charges(
    desk: &FrontDesk,
    invoice_id: &str,
    charges: ChargeInputs,
) -> ApiResult<Invoice> {
    debug!(invoice_id = %invoice_id, ?charges, "set_charges command");

    let now = desk.now();
    let (invoice, _) = desk
        .db()
        .invoices()
        .update_with(invoice_id, |inv| inv.set_charges(&charges, now))
        .await?;

    info!(invoice_id = %invoice_id, total = invoice.total_cents, "Charges updated");
    Ok(invoice)
}

pub async fn record_payment(
    desk: &FrontDesk,
    invoice_id: &str,
    amount_cents: i64,
    method: &str,
    reference: Option<String>,
) -> ApiResult<PaymentResponse> {
    debug!(invoice_id = %invoice_id, amount = amount_cents, method = %method, "record_payment command");

    let method = PaymentMethod::parse(method)?;
    let policy = desk.config().overpayment;
    let now = desk.now();

    let (invoice, payment) = desk
        .db()
        .invoices()
        .update_with(invoice_id, |inv| {
            inv.add_payment(amount_cents, method, reference, policy, now)
        })
        .await?;

    info!(
        invoice_id = %invoice_id,
        payment_id = %payment.id,
        amount = amount_cents,
        paid = invoice.paid_cents,
        balance = invoice.balance_cents,
        "Payment recorded"
    );

    Ok(PaymentResponse {
        payment,
        total_cents: invoice.total_cents,
        paid_cents: invoice.paid_cents,
        balance_cents: invoice.balance_cents,
        payment_status: invoice.payment_status,
        balance_display: desk.config().format_currency(invoice.balance_cents),
    })
}

/// Completes a settled invoice and marks its booking paid.
///
/// Add-ons never touch the booking; only the invoice that opened the bill
/// does.
pub async fn complete_invoice(desk: &FrontDesk, invoice_id: &str, actor: &str) -> ApiResult<Invoice> {
    debug!(invoice_id = %invoice_id, actor = %actor, "complete_invoice command");

    let now = desk.now();
    let (invoice, _) = desk
        .db()
        .invoices()
        .update_with(invoice_id, |inv| inv.mark_completed(actor, now))
        .await?;

    info!(invoice_id = %invoice_id, completed_by = %actor, "Invoice completed");

    if let (Some(booking_id), None) = (&invoice.allocation_id, &invoice.parent_invoice_id) {
        let allocations = desk.db().allocations();
        let booking = allocations.get(booking_id).await?;
        if booking.payment_status == BookingPaymentStatus::Pending {
            allocations.mark_paid(booking_id, now).await?;
            info!(booking_id = %booking_id, invoice_id = %invoice_id, "Booking marked paid");
        }
    }

    Ok(invoice)
}

pub async fn void_invoice(desk: &FrontDesk, invoice_id: &str) -> ApiResult<Invoice> {
    debug!(invoice_id = %invoice_id, "void_invoice command");

    let (invoice, _) = desk
        .db()
        .invoices()
        .update_with(invoice_id, |inv| inv.void(desk.now()))
        .await?;

    info!(invoice_id = %invoice_id, "Invoice voided");
    Ok(invoice)
}

pub async fn invoice_summary(desk: &FrontDesk, invoice_id: &str) -> ApiResult<InvoiceSummary> {
    debug!(invoice_id = %invoice_id, "invoice_summary command");

    let invoices = desk.db().invoices();
    let invoice = invoices.get(invoice_id).await?;
    let add_ons = invoices.list_add_ons(invoice_id).await?;
    let balance = combined_balance(&invoice, &add_ons);

    Ok(InvoiceSummary {
        invoice,
        add_ons,
        combined_balance_cents: balance.cents(),
        combined_balance_display: desk.config().format_currency(balance.cents()),
    })
}
