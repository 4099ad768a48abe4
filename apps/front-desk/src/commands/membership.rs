//! # Membership Commands
//!
//! Selling prepaid packages and drawing them down.

use bedbook_core::{MembershipPackage, MembershipStatus, NewPackage};
use tracing::{debug, info};

use crate::error::ApiResult;
use crate::state::FrontDesk;

pub async fn sell_package(desk: &FrontDesk, input: NewPackage) -> ApiResult<MembershipPackage> {
    debug!(customer_id = ?input.customer_id, name = %input.name, "sell_package command");

    let package = MembershipPackage::new(input, desk.now())?;
    desk.db().memberships().insert(&package).await?;

    info!(
        package_id = %package.id,
        sessions = package.num_of_sessions,
        remaining = %desk.config().format_currency(package.remaining_balance_cents),
        "Package sold"
    );
    Ok(package)
}

/// Draws one session outside a booking check-in.
pub async fn use_session(desk: &FrontDesk, package_id: &str) -> ApiResult<MembershipPackage> {
    debug!(package_id = %package_id, "use_session command");

    let now = desk.now();
    let (package, ()) = desk
        .db()
        .memberships()
        .update_with(package_id, |p| p.use_session(now))
        .await?;

    info!(
        package_id = %package_id,
        sessions_used = package.sessions_used,
        status = package.status.as_str(),
        "Session used"
    );
    Ok(package)
}

/// Takes money towards the package's remaining balance.
pub async fn settle_package(
    desk: &FrontDesk,
    package_id: &str,
    amount_cents: i64,
) -> ApiResult<MembershipPackage> {
    debug!(package_id = %package_id, amount = amount_cents, "settle_package command");

    let now = desk.now();
    let (package, ()) = desk
        .db()
        .memberships()
        .update_with(package_id, |p| p.settle_payment(amount_cents, now))
        .await?;

    info!(
        package_id = %package_id,
        remaining = package.remaining_balance_cents,
        "Package payment settled"
    );
    Ok(package)
}

pub async fn reprice_package(
    desk: &FrontDesk,
    package_id: &str,
    full_payment_cents: Option<i64>,
    discount_bps: Option<u32>,
) -> ApiResult<MembershipPackage> {
    debug!(package_id = %package_id, ?full_payment_cents, ?discount_bps, "reprice_package command");

    let now = desk.now();
    let (package, ()) = desk
        .db()
        .memberships()
        .update_with(package_id, |p| p.reprice(full_payment_cents, discount_bps, now))
        .await?;

    info!(package_id = %package_id, remaining = package.remaining_balance_cents, "Package repriced");
    Ok(package)
}

pub async fn set_package_status(
    desk: &FrontDesk,
    package_id: &str,
    status: MembershipStatus,
) -> ApiResult<MembershipPackage> {
    debug!(package_id = %package_id, status = status.as_str(), "set_package_status command");

    let now = desk.now();
    let (package, ()) = desk
        .db()
        .memberships()
        .update_with(package_id, |p| p.set_status(status, now))
        .await?;

    info!(package_id = %package_id, status = package.status.as_str(), "Package status changed");
    Ok(package)
}

/// Packages the customer can still book against, oldest first.
pub async fn usable_packages(desk: &FrontDesk, customer_id: &str) -> ApiResult<Vec<MembershipPackage>> {
    debug!(customer_id = %customer_id, "usable_packages command");
    Ok(desk.db().memberships().list_usable(customer_id).await?)
}
