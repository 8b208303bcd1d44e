//! Embedded SQLite metadata index (`local` backend).

use super::{MetadataIndex, insert_error};
use crate::{
    models::object_record::{NewObjectRecord, ObjectRecord},
    services::error::SlicerResult,
};
use async_trait::async_trait;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{str::FromStr, sync::Arc};
use uuid::Uuid;

#[derive(Clone)]
pub struct SqliteIndex {
    db: Arc<SqlitePool>,
}

impl SqliteIndex {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Open (creating if missing) the database at `database_url`.
    pub async fn connect(database_url: &str) -> SlicerResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self::new(Arc::new(pool)))
    }
}

#[async_trait]
impl MetadataIndex for SqliteIndex {
    async fn insert(&self, record: NewObjectRecord) -> SlicerResult<ObjectRecord> {
        // Id assignment and insert share one statement so concurrent writers
        // on this pool cannot observe the same max(object_id).
        sqlx::query_as::<_, ObjectRecord>(
            r#"
            INSERT INTO stored_objects (
                record_id, object_id, owner_id, container_id,
                base_name, extension, size_label, part_count
            )
            SELECT ?, COALESCE(MAX(object_id), 0) + 1, ?, ?, ?, ?, ?, ?
            FROM stored_objects
            RETURNING record_id, object_id, owner_id, container_id,
                      base_name, extension, size_label, part_count
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.owner_id)
        .bind(&record.container_id)
        .bind(&record.base_name)
        .bind(&record.extension)
        .bind(&record.size_label)
        .bind(i64::from(record.part_count))
        .fetch_one(&*self.db)
        .await
        .map_err(|err| insert_error(err, &record))
    }

    async fn list_all(&self) -> SlicerResult<Vec<ObjectRecord>> {
        Ok(sqlx::query_as::<_, ObjectRecord>(
            "SELECT record_id, object_id, owner_id, container_id,
                    base_name, extension, size_label, part_count
             FROM stored_objects ORDER BY object_id ASC",
        )
        .fetch_all(&*self.db)
        .await?)
    }

    async fn find_by_container(&self, container_id: &str) -> SlicerResult<Option<ObjectRecord>> {
        Ok(sqlx::query_as::<_, ObjectRecord>(
            "SELECT record_id, object_id, owner_id, container_id,
                    base_name, extension, size_label, part_count
             FROM stored_objects WHERE container_id = ?",
        )
        .bind(container_id)
        .fetch_optional(&*self.db)
        .await?)
    }

    async fn find_container_by_object_id(&self, object_id: i64) -> SlicerResult<Option<String>> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT container_id FROM stored_objects WHERE object_id = ?",
        )
        .bind(object_id)
        .fetch_optional(&*self.db)
        .await?)
    }

    async fn find_container_by_base_name(&self, base_name: &str) -> SlicerResult<Option<String>> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT container_id FROM stored_objects
             WHERE base_name = ? ORDER BY object_id ASC LIMIT 1",
        )
        .bind(base_name)
        .fetch_optional(&*self.db)
        .await?)
    }

    async fn find_container_by_container_id(
        &self,
        container_id: &str,
    ) -> SlicerResult<Option<String>> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT container_id FROM stored_objects WHERE container_id = ?",
        )
        .bind(container_id)
        .fetch_optional(&*self.db)
        .await?)
    }

    async fn delete_by_container(&self, container_id: &str) -> SlicerResult<bool> {
        let result = sqlx::query("DELETE FROM stored_objects WHERE container_id = ?")
            .bind(container_id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn migrate(&self) -> SlicerResult<()> {
        sqlx::migrate!("./migrations/sqlite").run(&*self.db).await?;
        Ok(())
    }

    async fn ping(&self) -> SlicerResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}
