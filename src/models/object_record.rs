//! Represents one stored file as tracked by the metadata index.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A logical file whose bytes live as parts inside one transport container.
///
/// The record is written only after every part has been transmitted, and is
/// removed together with its container. Stored fields are never mutated.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct ObjectRecord {
    /// Surrogate primary key assigned by the store.
    pub record_id: Uuid,

    /// Monotonically increasing logical id shown to users. Never reused.
    pub object_id: i64,

    /// Opaque id of the principal that uploaded the file.
    pub owner_id: String,

    /// Opaque id of the transport container holding the parts.
    pub container_id: String,

    /// Original filename without extension.
    pub base_name: String,

    /// Original extension without the leading dot. May be empty.
    pub extension: String,

    /// Human-readable size (e.g. "16.00 MB"). Display only.
    pub size_label: String,

    /// Number of parts. `None` for records written before schema version 2.
    pub part_count: Option<i64>,
}

impl ObjectRecord {
    /// Filename the object is reassembled under.
    pub fn file_name(&self) -> String {
        join_file_name(&self.base_name, &self.extension)
    }
}

/// Fields supplied by the upload pipeline; ids are assigned by the index.
#[derive(Clone, Debug)]
pub struct NewObjectRecord {
    pub owner_id: String,
    pub container_id: String,
    pub base_name: String,
    pub extension: String,
    pub size_label: String,
    pub part_count: u32,
}

pub fn join_file_name(base_name: &str, extension: &str) -> String {
    if extension.is_empty() {
        base_name.to_string()
    } else {
        format!("{}.{}", base_name, extension)
    }
}
