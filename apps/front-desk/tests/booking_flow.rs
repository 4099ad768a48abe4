//! Booking → invoice → payment → completion, end to end.

mod common;

use bedbook_core::{
    AllocationStatus, BookingPaymentStatus, ChargeInputs, InvoicePaymentStatus, InvoiceStatus,
    ItemType, PriceSource, ResourceStatus,
};
use common::{at, day, harness};
use front_desk::commands::billing::{self, OpenInvoiceInput};
use front_desk::commands::booking::{self, BookSlotInput};
use front_desk::ErrorCode;

fn ten_oclock(bed_id: &str) -> BookSlotInput {
    BookSlotInput {
        bed_id: bed_id.to_string(),
        customer_id: Some("cust-1".to_string()),
        membership_package_id: None,
        start: at(10, 0),
        duration_minutes: 60,
        total_amount_cents: 1000,
        final_amount_cents: None,
        confirm: true,
        notes: None,
    }
}

#[tokio::test]
async fn test_paid_booking_drives_status_board() {
    let h = harness().await;
    let bed = booking::register_bed(&h.desk, "Bed 1").await.unwrap();
    let booked = booking::book_slot(&h.desk, ten_oclock(&bed.id)).await.unwrap();
    assert_eq!(booked.booking_number, "BK-20260302-0001");
    assert_eq!(booked.status, AllocationStatus::Confirmed);

    // Unpaid bookings never show on the board.
    h.clock.set(at(10, 30));
    let board = booking::status_board(&h.desk).await.unwrap();
    assert_eq!(board[0].status, ResourceStatus::Available);

    // Bill it: 1000 − 10% + 10% service = 990.
    h.clock.set(at(9, 0));
    let invoice = billing::open_invoice(
        &h.desk,
        OpenInvoiceInput {
            booking_id: Some(booked.id.clone()),
            customer_id: None,
            bill_booking: true,
        },
    )
    .await
    .unwrap();
    assert_eq!(invoice.invoice_number, "INV-20260302-0001");
    assert_eq!(invoice.customer_id.as_deref(), Some("cust-1"));
    assert_eq!(invoice.subtotal_cents, 1000);

    let invoice = billing::set_charges(
        &h.desk,
        &invoice.id,
        ChargeInputs {
            discount_bps: Some(1000),
            service_charge_bps: Some(1000),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(invoice.total_cents, 990);

    // Cannot complete with money outstanding.
    let err = billing::complete_invoice(&h.desk, &invoice.id, "alice")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidState);

    let paid = billing::record_payment(&h.desk, &invoice.id, 500, "cash", None)
        .await
        .unwrap();
    assert_eq!(paid.payment_status, InvoicePaymentStatus::Partial);
    assert_eq!(paid.balance_display, "$4.90");

    let paid = billing::record_payment(&h.desk, &invoice.id, 490, "card", Some("AUTH-1".into()))
        .await
        .unwrap();
    assert_eq!(paid.balance_cents, 0);
    assert_eq!(paid.payment_status, InvoicePaymentStatus::Paid);

    let done = billing::complete_invoice(&h.desk, &invoice.id, "alice")
        .await
        .unwrap();
    assert_eq!(done.status, InvoiceStatus::Completed);
    assert_eq!(done.completed_by.as_deref(), Some("alice"));

    let booked = h.desk.db().allocations().get(&booked.id).await.unwrap();
    assert_eq!(booked.payment_status, BookingPaymentStatus::Paid);

    // Completed invoices are frozen.
    let err = billing::add_line(
        &h.desk,
        &invoice.id,
        ItemType::Product,
        PriceSource::custom("Oil", 200),
        1,
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidState);

    h.clock.set(at(9, 45));
    let board = booking::status_board(&h.desk).await.unwrap();
    assert_eq!(board[0].status, ResourceStatus::BookedSoon);

    h.clock.set(at(10, 30));
    let board = booking::status_board(&h.desk).await.unwrap();
    assert_eq!(board[0].status, ResourceStatus::Occupied);

    // The end instant still reads as occupied.
    h.clock.set(at(11, 0));
    let board = booking::status_board(&h.desk).await.unwrap();
    assert_eq!(board[0].status, ResourceStatus::Occupied);

    h.clock.set(at(11, 1));
    let board = booking::status_board(&h.desk).await.unwrap();
    assert_eq!(board[0].status, ResourceStatus::Available);
}

#[tokio::test]
async fn test_overlap_rejected_with_conflicting_ids() {
    let h = harness().await;
    let bed = booking::register_bed(&h.desk, "Bed 1").await.unwrap();
    let first = booking::book_slot(&h.desk, ten_oclock(&bed.id)).await.unwrap();

    let mut overlapping = ten_oclock(&bed.id);
    overlapping.start = at(10, 30);
    let err = booking::book_slot(&h.desk, overlapping).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Conflict);
    assert_eq!(err.conflicting, vec![first.id.clone()]);

    // Back-to-back is fine.
    let mut adjacent = ten_oclock(&bed.id);
    adjacent.start = at(11, 0);
    let second = booking::book_slot(&h.desk, adjacent).await.unwrap();
    assert_eq!(second.booking_number, "BK-20260302-0002");

    // 08:00..21:00 on a 30 minute grid is 27 starts; 09:30, 10:00, 10:30,
    // 11:00 and 11:30 now collide.
    let slots = booking::available_slots(&h.desk, &bed.id, day(), 60).await.unwrap();
    assert_eq!(slots.len(), 22);
    assert!(slots.iter().all(|s| s.end <= at(10, 0) || s.start >= at(12, 0)));
}

#[tokio::test]
async fn test_cancel_and_reschedule_free_the_window() {
    let h = harness().await;
    let bed = booking::register_bed(&h.desk, "Bed 1").await.unwrap();
    let first = booking::book_slot(&h.desk, ten_oclock(&bed.id)).await.unwrap();

    let moved = booking::reschedule_booking(&h.desk, &first.id, at(14, 0), 90)
        .await
        .unwrap();
    assert_eq!(moved.window.start, at(14, 0));
    assert_eq!(moved.window.duration_minutes(), 90);

    // The old window is free again.
    booking::book_slot(&h.desk, ten_oclock(&bed.id)).await.unwrap();

    booking::cancel_booking(&h.desk, &first.id).await.unwrap();
    let err = booking::confirm_booking(&h.desk, &first.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidState);

    let err = booking::reschedule_booking(&h.desk, &first.id, at(16, 0), 60)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidState);

    let mut retake = ten_oclock(&bed.id);
    retake.start = at(14, 0);
    booking::book_slot(&h.desk, retake).await.unwrap();
}

#[tokio::test]
async fn test_maintenance_blocks_booking_and_slots() {
    let h = harness().await;
    let bed = booking::register_bed(&h.desk, "Bed 1").await.unwrap();
    booking::set_maintenance(&h.desk, &bed.id, true).await.unwrap();

    let err = booking::book_slot(&h.desk, ten_oclock(&bed.id)).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidState);
    assert!(booking::available_slots(&h.desk, &bed.id, day(), 60)
        .await
        .unwrap()
        .is_empty());

    let board = booking::status_board(&h.desk).await.unwrap();
    assert_eq!(board[0].status, ResourceStatus::Maintenance);

    booking::retire_bed(&h.desk, &bed.id).await.unwrap();
    assert!(booking::status_board(&h.desk).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_and_restore() {
    let h = harness().await;
    let bed = booking::register_bed(&h.desk, "Bed 1").await.unwrap();
    let first = booking::book_slot(&h.desk, ten_oclock(&bed.id)).await.unwrap();

    booking::delete_booking(&h.desk, &first.id).await.unwrap();
    let taker = booking::book_slot(&h.desk, ten_oclock(&bed.id)).await.unwrap();

    // Its window is taken now, so it cannot come back.
    let err = booking::restore_booking(&h.desk, &first.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::Conflict);
    assert_eq!(err.conflicting, vec![taker.id.clone()]);

    booking::cancel_booking(&h.desk, &taker.id).await.unwrap();
    let restored = booking::restore_booking(&h.desk, &first.id).await.unwrap();
    assert!(restored.deleted_at.is_none());
}

#[tokio::test]
async fn test_bad_input_is_a_validation_error() {
    let h = harness().await;
    let bed = booking::register_bed(&h.desk, "Bed 1").await.unwrap();

    let mut zero = ten_oclock(&bed.id);
    zero.duration_minutes = 0;
    let err = booking::book_slot(&h.desk, zero).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);

    let mut endless = ten_oclock(&bed.id);
    endless.duration_minutes = i64::MAX / 1000;
    let err = booking::book_slot(&h.desk, endless).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);

    let booked = booking::book_slot(&h.desk, ten_oclock(&bed.id)).await.unwrap();
    let err = booking::reschedule_booking(&h.desk, &booked.id, at(14, 0), i64::MAX / 1000)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);

    let err = booking::book_slot(&h.desk, ten_oclock("no-such-bed")).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    let err = booking::register_bed(&h.desk, "  ").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);
}
