//! # Membership Repository
//!
//! Database operations for prepaid session packages.
//!
//! Every write is guarded by the row's `version`, so two desks consuming
//! the last session of a package at the same time cannot both succeed.

use bedbook_core::validation::validate_name;
use bedbook_core::{CoreResult, MembershipPackage, MembershipStatus};
use sqlx::sqlite::SqliteQueryResult;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

const SELECT_PACKAGE: &str = r#"
    SELECT
        id, customer_id, name, num_of_sessions, sessions_used, discount_bps,
        full_payment_cents, advance_payment_cents, remaining_balance_cents,
        status, created_at, updated_at, version
    FROM membership_packages
"#;

/// Repository for membership package database operations.
#[derive(Debug, Clone)]
pub struct MembershipRepository {
    pool: SqlitePool,
}

impl MembershipRepository {
    /// Creates a new MembershipRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MembershipRepository { pool }
    }

    /// Inserts a package built by `MembershipPackage::new`.
    pub async fn insert(&self, package: &MembershipPackage) -> DbResult<()> {
        validate_name("name", &package.name)?;
        debug!(
            id = %package.id,
            sessions = package.num_of_sessions,
            remaining = package.remaining_balance_cents,
            "Inserting membership package"
        );

        sqlx::query(
            r#"
            INSERT INTO membership_packages (
                id, customer_id, name, num_of_sessions, sessions_used, discount_bps,
                full_payment_cents, advance_payment_cents, remaining_balance_cents,
                status, created_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&package.id)
        .bind(&package.customer_id)
        .bind(package.name.trim())
        .bind(package.num_of_sessions)
        .bind(package.sessions_used)
        .bind(package.discount_bps)
        .bind(package.full_payment_cents)
        .bind(package.advance_payment_cents)
        .bind(package.remaining_balance_cents)
        .bind(package.status)
        .bind(package.created_at)
        .bind(package.updated_at)
        .bind(package.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a package by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<MembershipPackage>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Gets a package by ID, failing with NotFound.
    pub async fn get(&self, id: &str) -> DbResult<MembershipPackage> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("MembershipPackage", id))
    }

    /// A customer's packages, newest first.
    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<MembershipPackage>> {
        let packages = sqlx::query_as::<_, MembershipPackage>(&format!(
            "{SELECT_PACKAGE} WHERE customer_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(packages)
    }

    /// A customer's packages that can still be drawn from.
    pub async fn list_usable(&self, customer_id: &str) -> DbResult<Vec<MembershipPackage>> {
        let packages = sqlx::query_as::<_, MembershipPackage>(&format!(
            "{SELECT_PACKAGE} WHERE customer_id = ?1 AND status = ?2 \
             AND sessions_used < num_of_sessions ORDER BY created_at"
        ))
        .bind(customer_id)
        .bind(MembershipStatus::Active)
        .fetch_all(&self.pool)
        .await?;
        Ok(packages)
    }

    /// Writes back a package loaded earlier, bumping its version.
    pub async fn save(&self, package: &mut MembershipPackage) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        write(&mut conn, package).await?;
        package.version += 1;
        Ok(())
    }

    /// Loads the package, applies `f`, and saves the result atomically.
    pub async fn update_with<F, T>(&self, id: &str, f: F) -> DbResult<(MembershipPackage, T)>
    where
        F: FnOnce(&mut MembershipPackage) -> CoreResult<T>,
    {
        let mut tx = self.pool.begin().await?;

        let mut package = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("MembershipPackage", id))?;
        let output = f(&mut package)?;
        write(&mut tx, &package).await?;

        tx.commit().await?;
        package.version += 1;

        debug!(
            id = %id,
            sessions_used = package.sessions_used,
            remaining = package.remaining_balance_cents,
            status = package.status.as_str(),
            "Updated membership package"
        );
        Ok((package, output))
    }
}

pub(crate) async fn fetch(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<MembershipPackage>> {
    let package =
        sqlx::query_as::<_, MembershipPackage>(&format!("{SELECT_PACKAGE} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(package)
}

/// Version-guarded update of every mutable column.
pub(crate) async fn write(conn: &mut SqliteConnection, package: &MembershipPackage) -> DbResult<()> {
    let result: SqliteQueryResult = sqlx::query(
        r#"
        UPDATE membership_packages SET
            customer_id = ?3,
            name = ?4,
            num_of_sessions = ?5,
            sessions_used = ?6,
            discount_bps = ?7,
            full_payment_cents = ?8,
            advance_payment_cents = ?9,
            remaining_balance_cents = ?10,
            status = ?11,
            updated_at = ?12,
            version = version + 1
        WHERE id = ?1 AND version = ?2
        "#,
    )
    .bind(&package.id)
    .bind(package.version)
    .bind(&package.customer_id)
    .bind(&package.name)
    .bind(package.num_of_sessions)
    .bind(package.sessions_used)
    .bind(package.discount_bps)
    .bind(package.full_payment_cents)
    .bind(package.advance_payment_cents)
    .bind(package.remaining_balance_cents)
    .bind(package.status)
    .bind(package.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(match fetch(conn, &package.id).await? {
            Some(_) => DbError::stale("MembershipPackage", &package.id),
            None => DbError::not_found("MembershipPackage", &package.id),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use bedbook_core::{CoreError, NewPackage};
    use chrono::{DateTime, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn ten_sessions() -> MembershipPackage {
        MembershipPackage::new(
            NewPackage {
                customer_id: Some("cust-1".to_string()),
                name: "10 x 60 min".to_string(),
                num_of_sessions: 10,
                discount_bps: 1000,
                full_payment_cents: 10_000,
                advance_payment_cents: 4_000,
            },
            now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_settle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.memberships();
        let package = ten_sessions();
        repo.insert(&package).await.unwrap();

        let loaded = repo.get(&package.id).await.unwrap();
        assert_eq!(loaded.remaining_balance_cents, 5_000);

        let (settled, _) = repo
            .update_with(&package.id, |p| p.settle_payment(5_000, now()))
            .await
            .unwrap();
        assert_eq!(settled.remaining_balance_cents, 0);
        assert_eq!(settled.version, 1);

        let err = repo
            .update_with(&package.id, |p| p.settle_payment(1, now()))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_last_session_expires_package() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.memberships();
        let mut package = ten_sessions();
        package.num_of_sessions = 1;
        repo.insert(&package).await.unwrap();
        assert_eq!(repo.list_usable("cust-1").await.unwrap().len(), 1);

        let (used, _) = repo
            .update_with(&package.id, |p| p.use_session(now()))
            .await
            .unwrap();
        assert_eq!(used.status, MembershipStatus::Expired);
        assert!(repo.list_usable("cust-1").await.unwrap().is_empty());
        assert_eq!(repo.list_for_customer("cust-1").await.unwrap().len(), 1);

        assert!(matches!(
            repo.update_with(&package.id, |p| p.use_session(now())).await,
            Err(DbError::Domain(CoreError::InvalidState { .. }))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_use_detected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.memberships();
        let package = ten_sessions();
        repo.insert(&package).await.unwrap();

        let mut desk_a = repo.get(&package.id).await.unwrap();
        let mut desk_b = repo.get(&package.id).await.unwrap();

        desk_a.use_session(now()).unwrap();
        repo.save(&mut desk_a).await.unwrap();

        desk_b.use_session(now()).unwrap();
        assert!(matches!(
            repo.save(&mut desk_b).await,
            Err(DbError::Concurrency { .. })
        ));
        assert_eq!(repo.get(&package.id).await.unwrap().sessions_used, 1);
    }
}
