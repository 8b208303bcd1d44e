//! Metadata index: maps object ids, filenames and container ids to records.
//!
//! Two interchangeable backends satisfy the same contract: an embedded SQLite
//! store (`local`) and a shared PostgreSQL store (`remote`). The backend is
//! chosen once at startup and never switched at runtime.

#[cfg(test)]
pub(crate) mod contract;
pub mod postgres;
pub mod sqlite;

use crate::{
    models::object_record::{NewObjectRecord, ObjectRecord},
    services::error::{SlicerError, SlicerResult},
};
use async_trait::async_trait;
use std::sync::Arc;

pub use postgres::PostgresIndex;
pub use sqlite::SqliteIndex;

/// Which metadata backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MetadataBackend {
    /// Embedded SQLite file; ids are `max(object_id) + 1`.
    Local,
    /// Shared PostgreSQL database; ids come from an atomic counter row.
    Remote,
}

/// Lookups return `Ok(None)` for "no such record"; backend failures surface
/// as `SlicerError::StorageUnavailable`.
#[async_trait]
pub trait MetadataIndex: Send + Sync {
    /// Insert a record, assigning the next `object_id`.
    ///
    /// Fails with `DuplicateObject` if a record for the container exists.
    async fn insert(&self, record: NewObjectRecord) -> SlicerResult<ObjectRecord>;

    /// Every record. Ordering differs between backends.
    async fn list_all(&self) -> SlicerResult<Vec<ObjectRecord>>;

    async fn find_by_container(&self, container_id: &str) -> SlicerResult<Option<ObjectRecord>>;

    async fn find_container_by_object_id(&self, object_id: i64) -> SlicerResult<Option<String>>;

    /// First record (lowest object id) with this base name. Base names are
    /// not unique, so later uploads with the same name are shadowed.
    async fn find_container_by_base_name(&self, base_name: &str) -> SlicerResult<Option<String>>;

    /// Existence check for a record owning `container_id`.
    async fn find_container_by_container_id(
        &self,
        container_id: &str,
    ) -> SlicerResult<Option<String>>;

    /// Returns whether a record existed and was removed.
    async fn delete_by_container(&self, container_id: &str) -> SlicerResult<bool>;

    /// Apply pending schema migrations.
    async fn migrate(&self) -> SlicerResult<()>;

    /// Cheap connectivity probe.
    async fn ping(&self) -> SlicerResult<()>;
}

/// Connect to the configured backend.
pub async fn connect(
    backend: MetadataBackend,
    database_url: &str,
) -> SlicerResult<Arc<dyn MetadataIndex>> {
    let index: Arc<dyn MetadataIndex> = match backend {
        MetadataBackend::Local => Arc::new(SqliteIndex::connect(database_url).await?),
        MetadataBackend::Remote => Arc::new(PostgresIndex::connect(database_url).await?),
    };
    Ok(index)
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.is_unique_violation()
            || db_err.message().to_ascii_lowercase().contains("unique")
    )
}

/// Map an insert failure, turning uniqueness conflicts into `DuplicateObject`.
fn insert_error(err: sqlx::Error, record: &NewObjectRecord) -> SlicerError {
    if is_unique_violation(&err) {
        SlicerError::DuplicateObject(record.base_name.clone())
    } else {
        SlicerError::StorageUnavailable(err)
    }
}
