//! Shared PostgreSQL metadata index (`remote` backend).
//!
//! Object ids come from the `counters` row named `object_id`, incremented
//! with an upsert so several processes can insert concurrently.

use super::{MetadataIndex, insert_error};
use crate::{
    models::object_record::{NewObjectRecord, ObjectRecord},
    services::error::SlicerResult,
};
use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct PostgresIndex {
    db: Arc<PgPool>,
}

impl PostgresIndex {
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }

    pub async fn connect(database_url: &str) -> SlicerResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        info!("connected to remote metadata store");
        Ok(Self::new(Arc::new(pool)))
    }
}

#[async_trait]
impl MetadataIndex for PostgresIndex {
    async fn insert(&self, record: NewObjectRecord) -> SlicerResult<ObjectRecord> {
        sqlx::query_as::<_, ObjectRecord>(
            r#"
            WITH next_id AS (
                INSERT INTO counters (name, sequence_value) VALUES ('object_id', 1)
                ON CONFLICT (name) DO UPDATE
                    SET sequence_value = counters.sequence_value + 1
                RETURNING sequence_value
            )
            INSERT INTO stored_objects (
                record_id, object_id, owner_id, container_id,
                base_name, extension, size_label, part_count
            )
            SELECT $1, next_id.sequence_value, $2, $3, $4, $5, $6, $7
            FROM next_id
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
             FROM stored_objects",
        )
        .fetch_all(&*self.db)
        .await?)
    }

    async fn find_by_container(&self, container_id: &str) -> SlicerResult<Option<ObjectRecord>> {
        Ok(sqlx::query_as::<_, ObjectRecord>(
            "SELECT record_id, object_id, owner_id, container_id,
                    base_name, extension, size_label, part_count
             FROM stored_objects WHERE container_id = $1",
        )
        .bind(container_id)
        .fetch_optional(&*self.db)
        .await?)
    }

    async fn find_container_by_object_id(&self, object_id: i64) -> SlicerResult<Option<String>> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT container_id FROM stored_objects WHERE object_id = $1",
        )
        .bind(object_id)
        .fetch_optional(&*self.db)
        .await?)
    }

    async fn find_container_by_base_name(&self, base_name: &str) -> SlicerResult<Option<String>> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT container_id FROM stored_objects
             WHERE base_name = $1 ORDER BY object_id ASC LIMIT 1",
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
            "SELECT container_id FROM stored_objects WHERE container_id = $1",
        )
        .bind(container_id)
        .fetch_optional(&*self.db)
        .await?)
    }

    async fn delete_by_container(&self, container_id: &str) -> SlicerResult<bool> {
        let result = sqlx::query("DELETE FROM stored_objects WHERE container_id = $1")
            .bind(container_id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn migrate(&self) -> SlicerResult<()> {
        sqlx::migrate!("./migrations/postgres").run(&*self.db).await?;
        Ok(())
    }

    async fn ping(&self) -> SlicerResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::metadata::contract;
    use std::env;

    /// Migrated index on the database named by `CHUNKVAULT_TEST_POSTGRES_URL`,
    /// or `None` when no test database is configured.
    async fn test_index() -> Option<PostgresIndex> {
        let url = env::var("CHUNKVAULT_TEST_POSTGRES_URL").ok()?;
        let index = PostgresIndex::connect(&url).await.unwrap();
        index.migrate().await.unwrap();
        Some(index)
    }

    #[tokio::test]
    async fn remote_index_meets_the_shared_contract() {
        let Some(index) = test_index().await else {
            return;
        };
        let tag = Uuid::new_v4().simple().to_string();
        contract::run_all(&index, &tag).await;
    }

    #[tokio::test]
    async fn counter_ids_are_never_reused() {
        let Some(index) = test_index().await else {
            return;
        };
        let tag = Uuid::new_v4().simple().to_string();
        let first = index
            .insert(contract::new_record(&format!("{tag}-a"), "a"))
            .await
            .unwrap();
        index.delete_by_container(&first.container_id).await.unwrap();
        let second = index
            .insert(contract::new_record(&format!("{tag}-b"), "b"))
            .await
            .unwrap();
        assert!(second.object_id > first.object_id);
    }
}
