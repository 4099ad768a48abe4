//! # Commands Module
//!
//! One async function per front desk action.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs         ◄─── You are here (exports)
//! ├── booking.rs     ◄─── Beds, slots, status board, booking lifecycle
//! ├── billing.rs     ◄─── Invoices, add-ons, lines, charges, payments
//! └── membership.rs  ◄─── Prepaid packages
//! ```
//!
//! ## How Commands Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  pub async fn record_payment(                                          │
//! │      desk: &FrontDesk,        ◄── db + clock + config                  │
//! │      invoice_id: &str,        ◄── caller input                         │
//! │      ...                                                                │
//! │  ) -> ApiResult<PaymentResponse>                                       │
//! │         │                                                               │
//! │         ├── now = desk.now()                                           │
//! │         ├── repository loads, engine mutates, repository saves         │
//! │         └── info!(...) on success, ApiError on failure                 │
//! │                                                                         │
//! │  Responses and errors serialize to camelCase JSON.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod billing;
pub mod booking;
pub mod membership;
