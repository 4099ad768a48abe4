//! # Invoice Repository
//!
//! Database operations for invoices, their line items and payments.
//!
//! ## Aggregate Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     update_with(id, |inv| ...)                          │
//! │                                                                         │
//! │  BEGIN                                                                 │
//! │   ├── SELECT header + items + payments        (version = N)            │
//! │   ├── closure runs an Invoice engine operation (recompute included)    │
//! │   ├── UPDATE invoices ... version = N + 1 WHERE id = ? AND version = N │
//! │   │      └── 0 rows → DbError::Concurrency                             │
//! │   ├── replace invoice_items                                            │
//! │   └── append new payments (existing ones never change)                 │
//! │  COMMIT                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bedbook_core::numbering::DocumentKind;
use bedbook_core::{CoreResult, Invoice, LineItem, Payment};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteQueryResult;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::sequence;

const SELECT_INVOICE: &str = r#"
    SELECT
        id, invoice_number, customer_id, allocation_id, parent_invoice_id,
        discount_bps, discount_cents, service_charge_bps, service_charge_cents,
        tax_bps, tax_cents, additional_charges_cents,
        subtotal_cents, applied_discount_cents, applied_service_charge_cents,
        applied_tax_cents, total_cents, paid_cents, balance_cents, payment_status,
        status, completed_by, completed_at, notes, created_at, updated_at, version
    FROM invoices
"#;

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Allocates the next invoice number for `day`, builds the invoice with
    /// `build`, and inserts it, all in one transaction.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let invoice = db.invoices()
    ///     .create_with(day, |number| Ok(Invoice::draft(number, None, Some(booking_id), now)))
    ///     .await?;
    /// ```
    pub async fn create_with<F>(&self, day: NaiveDate, build: F) -> DbResult<Invoice>
    where
        F: FnOnce(String) -> CoreResult<Invoice>,
    {
        let mut tx = self.pool.begin().await?;

        let number = sequence::next_number(&mut tx, DocumentKind::Invoice, day).await?;
        let invoice = build(number)?;

        debug!(
            id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            parent = ?invoice.parent_invoice_id,
            "Inserting invoice"
        );

        insert_header(&mut tx, &invoice).await?;
        replace_items(&mut tx, &invoice).await?;
        append_payments(&mut tx, &invoice).await?;

        tx.commit().await?;
        Ok(invoice)
    }

    /// Gets an invoice with its items and payments.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Gets an invoice with its items and payments, failing with NotFound.
    pub async fn get(&self, id: &str) -> DbResult<Invoice> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", id))
    }

    /// Invoices billed against a booking, oldest first.
    pub async fn list_for_allocation(&self, allocation_id: &str) -> DbResult<Vec<Invoice>> {
        self.list_where("allocation_id = ?1", allocation_id).await
    }

    /// Add-on invoices of `parent_id`, oldest first.
    pub async fn list_add_ons(&self, parent_id: &str) -> DbResult<Vec<Invoice>> {
        self.list_where("parent_invoice_id = ?1", parent_id).await
    }

    async fn list_where(&self, clause: &str, value: &str) -> DbResult<Vec<Invoice>> {
        let mut conn = self.pool.acquire().await?;

        let headers = sqlx::query_as::<_, Invoice>(&format!(
            "{SELECT_INVOICE} WHERE {clause} ORDER BY created_at, invoice_number"
        ))
        .bind(value)
        .fetch_all(&mut *conn)
        .await?;

        let mut invoices = Vec::with_capacity(headers.len());
        for mut invoice in headers {
            load_children(&mut conn, &mut invoice).await?;
            invoices.push(invoice);
        }
        Ok(invoices)
    }

    /// Writes back an invoice loaded earlier.
    ///
    /// Fails with `DbError::Concurrency` if someone else saved it in between.
    /// On success `invoice.version` is bumped to match the stored row.
    pub async fn save(&self, invoice: &mut Invoice) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        write_aggregate(&mut tx, invoice).await?;
        tx.commit().await?;

        invoice.version += 1;
        Ok(())
    }

    /// Loads the invoice, applies `f`, and saves the result atomically.
    ///
    /// Nothing is written when `f` fails.
    pub async fn update_with<F, T>(&self, id: &str, f: F) -> DbResult<(Invoice, T)>
    where
        F: FnOnce(&mut Invoice) -> CoreResult<T>,
    {
        let mut tx = self.pool.begin().await?;

        let mut invoice = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", id))?;
        let output = f(&mut invoice)?;
        write_aggregate(&mut tx, &invoice).await?;

        tx.commit().await?;
        invoice.version += 1;

        debug!(
            id = %id,
            total = invoice.total_cents,
            balance = invoice.balance_cents,
            payment_status = ?invoice.payment_status,
            status = ?invoice.status,
            "Updated invoice"
        );
        Ok((invoice, output))
    }
}

async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Invoice>> {
    let header = sqlx::query_as::<_, Invoice>(&format!("{SELECT_INVOICE} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match header {
        Some(mut invoice) => {
            load_children(conn, &mut invoice).await?;
            Ok(Some(invoice))
        }
        None => Ok(None),
    }
}

async fn load_children(conn: &mut SqliteConnection, invoice: &mut Invoice) -> DbResult<()> {
    invoice.items = sqlx::query_as::<_, LineItem>(
        r#"
        SELECT
            id, invoice_id, item_type, source_id, name, quantity,
            unit_price_cents, discount_cents, total_price_cents, position, created_at
        FROM invoice_items
        WHERE invoice_id = ?1
        ORDER BY position
        "#,
    )
    .bind(&invoice.id)
    .fetch_all(&mut *conn)
    .await?;

    invoice.payments = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, invoice_id, method, amount_cents, reference, status, created_at
        FROM payments
        WHERE invoice_id = ?1
        ORDER BY created_at, rowid
        "#,
    )
    .bind(&invoice.id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_header(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO invoices (
            id, invoice_number, customer_id, allocation_id, parent_invoice_id,
            discount_bps, discount_cents, service_charge_bps, service_charge_cents,
            tax_bps, tax_cents, additional_charges_cents,
            subtotal_cents, applied_discount_cents, applied_service_charge_cents,
            applied_tax_cents, total_cents, paid_cents, balance_cents, payment_status,
            status, completed_by, completed_at, notes, created_at, updated_at, version
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11, ?12,
            ?13, ?14, ?15,
            ?16, ?17, ?18, ?19, ?20,
            ?21, ?22, ?23, ?24, ?25, ?26, ?27
        )
        "#,
    )
    .bind(&invoice.id)
    .bind(&invoice.invoice_number)
    .bind(&invoice.customer_id)
    .bind(&invoice.allocation_id)
    .bind(&invoice.parent_invoice_id)
    .bind(invoice.discount_bps)
    .bind(invoice.discount_cents)
    .bind(invoice.service_charge_bps)
    .bind(invoice.service_charge_cents)
    .bind(invoice.tax_bps)
    .bind(invoice.tax_cents)
    .bind(invoice.additional_charges_cents)
    .bind(invoice.subtotal_cents)
    .bind(invoice.applied_discount_cents)
    .bind(invoice.applied_service_charge_cents)
    .bind(invoice.applied_tax_cents)
    .bind(invoice.total_cents)
    .bind(invoice.paid_cents)
    .bind(invoice.balance_cents)
    .bind(invoice.payment_status)
    .bind(invoice.status)
    .bind(&invoice.completed_by)
    .bind(invoice.completed_at)
    .bind(&invoice.notes)
    .bind(invoice.created_at)
    .bind(invoice.updated_at)
    .bind(invoice.version)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Version-checked header update, then children.
async fn write_aggregate(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
    let result: SqliteQueryResult = sqlx::query(
        r#"
        UPDATE invoices SET
            customer_id = ?3,
            discount_bps = ?4,
            discount_cents = ?5,
            service_charge_bps = ?6,
            service_charge_cents = ?7,
            tax_bps = ?8,
            tax_cents = ?9,
            additional_charges_cents = ?10,
            subtotal_cents = ?11,
            applied_discount_cents = ?12,
            applied_service_charge_cents = ?13,
            applied_tax_cents = ?14,
            total_cents = ?15,
            paid_cents = ?16,
            balance_cents = ?17,
            payment_status = ?18,
            status = ?19,
            completed_by = ?20,
            completed_at = ?21,
            notes = ?22,
            updated_at = ?23,
            version = version + 1
        WHERE id = ?1 AND version = ?2
        "#,
    )
    .bind(&invoice.id)
    .bind(invoice.version)
    .bind(&invoice.customer_id)
    .bind(invoice.discount_bps)
    .bind(invoice.discount_cents)
    .bind(invoice.service_charge_bps)
    .bind(invoice.service_charge_cents)
    .bind(invoice.tax_bps)
    .bind(invoice.tax_cents)
    .bind(invoice.additional_charges_cents)
    .bind(invoice.subtotal_cents)
    .bind(invoice.applied_discount_cents)
    .bind(invoice.applied_service_charge_cents)
    .bind(invoice.applied_tax_cents)
    .bind(invoice.total_cents)
    .bind(invoice.paid_cents)
    .bind(invoice.balance_cents)
    .bind(invoice.payment_status)
    .bind(invoice.status)
    .bind(&invoice.completed_by)
    .bind(invoice.completed_at)
    .bind(&invoice.notes)
    .bind(invoice.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let exists: Option<i64> = sqlx::query_scalar("SELECT version FROM invoices WHERE id = ?1")
            .bind(&invoice.id)
            .fetch_optional(&mut *conn)
            .await?;
        return Err(match exists {
            Some(_) => DbError::stale("Invoice", &invoice.id),
            None => DbError::not_found("Invoice", &invoice.id),
        });
    }

    replace_items(conn, invoice).await?;
    append_payments(conn, invoice).await?;
    Ok(())
}

async fn replace_items(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
    sqlx::query("DELETE FROM invoice_items WHERE invoice_id = ?1")
        .bind(&invoice.id)
        .execute(&mut *conn)
        .await?;

    for item in &invoice.items {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (
                id, invoice_id, item_type, source_id, name, quantity,
                unit_price_cents, discount_cents, total_price_cents, position, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&item.id)
        .bind(&invoice.id)
        .bind(item.item_type)
        .bind(&item.source_id)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.discount_cents)
        .bind(item.total_price_cents)
        .bind(item.position)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn append_payments(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
    for payment in &invoice.payments {
        let result: SqliteQueryResult = sqlx::query(
            r#"
            INSERT INTO payments (id, invoice_id, method, amount_cents, reference, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&payment.id)
        .bind(&invoice.id)
        .bind(payment.method)
        .bind(payment.amount_cents)
        .bind(&payment.reference)
        .bind(payment.status)
        .bind(payment.created_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() > 0 {
            debug!(invoice_id = %invoice.id, amount = payment.amount_cents, "Recorded payment");
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use bedbook_core::{
        ChargeInputs, CoreError, InvoicePaymentStatus, InvoiceStatus, ItemType, OverpaymentPolicy,
        PaymentMethod, PriceSource,
    };
    use chrono::{DateTime, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    async fn draft(db: &Database) -> Invoice {
        db.invoices()
            .create_with(day(), |number| Ok(Invoice::draft(number, None, None, now())))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_numbers_and_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let first = draft(&db).await;
        let second = draft(&db).await;
        assert_eq!(first.invoice_number, "INV-20260302-0001");
        assert_eq!(second.invoice_number, "INV-20260302-0002");

        let loaded = db.invoices().get(&first.id).await.unwrap();
        assert_eq!(loaded.status, InvoiceStatus::Draft);
        assert_eq!(loaded.version, 0);
        assert!(loaded.items.is_empty());
    }

    #[tokio::test]
    async fn test_update_with_persists_items_charges_and_payments() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let invoice = draft(&db).await;
        let repo = db.invoices();

        let (_, item) = repo
            .update_with(&invoice.id, |inv| {
                inv.add_item(ItemType::Package, &PriceSource::custom("60 min", 1000), 1, now())
            })
            .await
            .unwrap();
        repo.update_with(&invoice.id, |inv| {
            inv.set_charges(
                &ChargeInputs {
                    discount_bps: Some(1000),
                    service_charge_bps: Some(1000),
                    ..Default::default()
                },
                now(),
            )
        })
        .await
        .unwrap();
        repo.update_with(&invoice.id, |inv| {
            inv.add_payment(500, PaymentMethod::Cash, None, OverpaymentPolicy::Reject, now())
        })
        .await
        .unwrap();

        let loaded = repo.get(&invoice.id).await.unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].id, item.id);
        assert_eq!(loaded.total_cents, 990);
        assert_eq!(loaded.paid_cents, 500);
        assert_eq!(loaded.balance_cents, 490);
        assert_eq!(loaded.payment_status, InvoicePaymentStatus::Partial);
        assert_eq!(loaded.payments.len(), 1);
        assert_eq!(loaded.version, 3);

        // Reloaded aggregate recomputes to the same cached values.
        let mut again = loaded.clone();
        again.recompute().unwrap();
        assert_eq!(again.balance_cents, loaded.balance_cents);
    }

    #[tokio::test]
    async fn test_failed_operation_writes_nothing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let invoice = draft(&db).await;

        let err = db
            .invoices()
            .update_with(&invoice.id, |inv| {
                inv.add_payment(0, PaymentMethod::Cash, None, OverpaymentPolicy::Allow, now())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        let loaded = db.invoices().get(&invoice.id).await.unwrap();
        assert_eq!(loaded.version, 0);
        assert!(loaded.payments.is_empty());
    }

    #[tokio::test]
    async fn test_stale_save_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let invoice = draft(&db).await;
        let repo = db.invoices();

        let mut first = repo.get(&invoice.id).await.unwrap();
        let mut second = repo.get(&invoice.id).await.unwrap();

        first
            .add_item(ItemType::Product, &PriceSource::custom("Oil", 250), 1, now())
            .unwrap();
        repo.save(&mut first).await.unwrap();
        assert_eq!(first.version, 1);

        second
            .add_item(ItemType::Product, &PriceSource::custom("Towel", 100), 1, now())
            .unwrap();
        assert!(matches!(
            repo.save(&mut second).await,
            Err(DbError::Concurrency { .. })
        ));

        let loaded = repo.get(&invoice.id).await.unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].name, "Oil");
    }

    #[tokio::test]
    async fn test_add_ons_listed_under_parent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let parent = draft(&db).await;
        let repo = db.invoices();

        let add_on = repo
            .create_with(day(), |number| Invoice::add_on(&parent, number, now()))
            .await
            .unwrap();
        assert_eq!(add_on.parent_invoice_id.as_deref(), Some(parent.id.as_str()));

        let listed = repo.list_add_ons(&parent.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, add_on.id);
    }

    #[tokio::test]
    async fn test_unknown_invoice() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(matches!(
            db.invoices().get("missing").await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            db.invoices()
                .update_with("missing", |inv| inv.void(now()))
                .await,
            Err(DbError::NotFound { .. })
        ));
    }
}
