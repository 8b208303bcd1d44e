//! Two-phase deletion: resolve and show the object, then act only on an
//! explicit confirmation.

use crate::{
    models::object_record::ObjectRecord,
    services::{
        error::{SlicerError, SlicerResult},
        format::format_duration,
        slicer_service::SlicerService,
    },
};
use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// The requester's answer at the confirmation point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Confirm,
    Cancel,
}

/// Asks the requester whether `record` should really be deleted.
#[async_trait]
pub trait Confirmation: Send + Sync {
    async fn confirm(&self, record: &ObjectRecord) -> Decision;
}

/// Answer decided up front, e.g. from a request flag.
pub struct PresetDecision(pub Decision);

#[async_trait]
impl Confirmation for PresetDecision {
    async fn confirm(&self, _record: &ObjectRecord) -> Decision {
        self.0
    }
}

#[derive(Debug, Clone)]
pub enum DeletionOutcome {
    Deleted {
        record: ObjectRecord,
        elapsed: Duration,
    },
    Cancelled {
        record: ObjectRecord,
    },
}

impl DeletionOutcome {
    pub fn describe(&self) -> String {
        match self {
            DeletionOutcome::Deleted { record, elapsed } => format!(
                "Successfully deleted {} in {}",
                record.file_name(),
                format_duration(*elapsed)
            ),
            DeletionOutcome::Cancelled { record } => {
                format!("Canceled deletion of {}", record.file_name())
            }
        }
    }
}

impl SlicerService {
    /// Delete the object identified by `token` once `confirmation` agrees.
    ///
    /// The container is removed first; the record is only deleted after that
    /// succeeded. A record whose container is already gone, or a removed
    /// container without a record to delete, is reported as
    /// `MetadataInconsistency` and left for manual repair.
    pub async fn delete(
        &self,
        token: &str,
        confirmation: &dyn Confirmation,
    ) -> SlicerResult<DeletionOutcome> {
        let started = Instant::now();
        let not_found = || SlicerError::ObjectNotFound(token.to_string());

        let container_id = self.resolve(token).await?.ok_or_else(not_found)?;
        let record = self
            .index
            .find_by_container(&container_id)
            .await?
            .ok_or_else(not_found)?;
        info!(%container_id, file = %record.file_name(), "found object to delete");

        if confirmation.confirm(&record).await == Decision::Cancel {
            info!(%container_id, "deletion canceled");
            return Ok(DeletionOutcome::Cancelled { record });
        }

        if self
            .transport
            .find_container_by_id(&container_id)
            .await?
            .is_none()
        {
            error!(%container_id, "record exists but its container is gone");
            return Err(SlicerError::MetadataInconsistency {
                container_id,
                detail: "record exists but container is gone".into(),
            });
        }
        if let Err(err) = self.transport.delete_container(&container_id).await {
            error!(%container_id, "container removal failed, record kept: {}", err);
            return Err(err.into());
        }
        if !self.index.delete_by_container(&container_id).await? {
            error!(%container_id, "container removed but no record was deleted");
            return Err(SlicerError::MetadataInconsistency {
                container_id,
                detail: "container removed but no metadata record existed".into(),
            });
        }

        let outcome = DeletionOutcome::Deleted {
            record,
            elapsed: started.elapsed(),
        };
        info!("{}", outcome.describe());
        Ok(outcome)
    }
}
