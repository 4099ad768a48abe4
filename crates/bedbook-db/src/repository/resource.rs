//! # Resource Repository
//!
//! Database operations for beds/stations.

use bedbook_core::validation::validate_name;
use bedbook_core::Resource;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteQueryResult;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

const SELECT_RESOURCE: &str = r#"
    SELECT id, name, maintenance, is_active, created_at, updated_at
    FROM resources
"#;

/// Repository for resource database operations.
#[derive(Debug, Clone)]
pub struct ResourceRepository {
    pool: SqlitePool,
}

impl ResourceRepository {
    /// Creates a new ResourceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ResourceRepository { pool }
    }

    /// Inserts a new resource.
    pub async fn insert(&self, resource: &Resource) -> DbResult<()> {
        validate_name("name", &resource.name)?;
        debug!(id = %resource.id, name = %resource.name, "Inserting resource");

        sqlx::query(
            r#"
            INSERT INTO resources (id, name, maintenance, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&resource.id)
        .bind(resource.name.trim())
        .bind(resource.maintenance)
        .bind(resource.is_active)
        .bind(resource.created_at)
        .bind(resource.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a resource by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Resource>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Gets a resource by ID, failing with NotFound.
    pub async fn get(&self, id: &str) -> DbResult<Resource> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Resource", id))
    }

    /// Lists active resources by name.
    pub async fn list_active(&self) -> DbResult<Vec<Resource>> {
        let resources = sqlx::query_as::<_, Resource>(&format!(
            "{SELECT_RESOURCE} WHERE is_active = 1 ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        debug!(count = resources.len(), "Listed active resources");
        Ok(resources)
    }

    /// Sets or clears the maintenance flag.
    pub async fn set_maintenance(
        &self,
        id: &str,
        maintenance: bool,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(id = %id, maintenance, "Updating maintenance flag");

        let result: SqliteQueryResult = sqlx::query(
            "UPDATE resources SET maintenance = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(maintenance)
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Resource", id));
        }
        Ok(())
    }

    /// Soft-deletes a resource. Its bookings stay on record.
    pub async fn deactivate(&self, id: &str, at: DateTime<Utc>) -> DbResult<()> {
        debug!(id = %id, "Deactivating resource");

        let result: SqliteQueryResult = sqlx::query(
            "UPDATE resources SET is_active = 0, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Resource (active)", id));
        }
        Ok(())
    }
}

/// Loads a resource on an existing connection or transaction.
pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Resource>> {
    let resource = sqlx::query_as::<_, Resource>(&format!("{SELECT_RESOURCE} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.resources();

        let bed_b = Resource::new("Bed B", now());
        let bed_a = Resource::new("Bed A", now());
        repo.insert(&bed_b).await.unwrap();
        repo.insert(&bed_a).await.unwrap();

        let listed = repo.list_active().await.unwrap();
        let names: Vec<_> = listed.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Bed A", "Bed B"]);

        let loaded = repo.get(&bed_a.id).await.unwrap();
        assert!(!loaded.maintenance);
        assert_eq!(loaded.created_at, now());
    }

    #[tokio::test]
    async fn test_maintenance_and_deactivate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.resources();
        let bed = Resource::new("Bed 1", now());
        repo.insert(&bed).await.unwrap();

        repo.set_maintenance(&bed.id, true, now()).await.unwrap();
        assert!(repo.get(&bed.id).await.unwrap().maintenance);

        repo.deactivate(&bed.id, now()).await.unwrap();
        assert!(repo.list_active().await.unwrap().is_empty());
        assert!(matches!(
            repo.deactivate(&bed.id, now()).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            repo.get("missing").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_insert_rejects_blank_name() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let bed = Resource::new("   ", now());
        assert!(matches!(
            db.resources().insert(&bed).await,
            Err(DbError::Domain(_))
        ));
    }
}
