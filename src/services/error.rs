//! Error taxonomy shared by every chunked-transfer operation.

use crate::services::transport::TransportError;
use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlicerError {
    #[error("file `{}` does not exist", .0.display())]
    SourceNotFound(PathBuf),
    #[error("file `{}` is empty", .0.display())]
    EmptySource(PathBuf),
    #[error("an object named `{0}` already exists")]
    DuplicateObject(String),
    #[error("no object found for `{0}`")]
    ObjectNotFound(String),
    #[error("container `{0}` holds no parts")]
    NoPartsFound(String),
    #[error("`{0}` does not contain any character usable as a container name")]
    InvalidObjectName(String),
    #[error("grouping container `{0}` not found")]
    GroupingContainerMissing(String),
    #[error("container `{0}` not found")]
    ContainerMissing(String),
    #[error("only {written} out of {expected} parts were written")]
    PartialTransfer { expected: u32, written: u32 },
    #[error("metadata inconsistency for container `{container_id}`: {detail}")]
    MetadataInconsistency {
        container_id: String,
        detail: String,
    },
    #[error("failed to merge parts into `{}`: {source}", .path.display())]
    MergeFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("metadata store unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),
    #[error("metadata migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("transport unavailable: {0}")]
    TransportUnavailable(#[from] TransportError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type SlicerResult<T> = Result<T, SlicerError>;
