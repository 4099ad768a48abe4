//! # Repository Module
//!
//! Database repository implementations for Bedbook.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Repository Layout                               │
//! │                                                                         │
//! │  front-desk command                                                    │
//! │       │                                                                 │
//! │       │  db.allocations().create(&request, status, day, now)           │
//! │       ▼                                                                 │
//! │  AllocationRepository                                                  │
//! │  ├── loads the bed + overlapping rows inside a transaction             │
//! │  ├── runs bedbook_core::availability::check_booking                    │
//! │  ├── takes the next BK number from daily_sequences                     │
//! │  └── INSERT (overlap trigger as the last line of defence)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ResourceRepository`](resource::ResourceRepository) - Beds and stations
//! - [`AllocationRepository`](allocation::AllocationRepository) - Bookings and their lifecycle
//! - [`InvoiceRepository`](invoice::InvoiceRepository) - Invoice aggregates (items, payments)
//! - [`MembershipRepository`](membership::MembershipRepository) - Session packages
//! - [`SequenceRepository`](sequence::SequenceRepository) - Day-scoped document numbers

pub mod allocation;
pub mod invoice;
pub mod membership;
pub mod resource;
pub mod sequence;
