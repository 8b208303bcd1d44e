//! src/services/slicer_service.rs
//!
//! SlicerService - the chunked object store. Metadata lives in a pluggable
//! `MetadataIndex`; payload bytes live as bounded-size parts inside transport
//! containers. Local disk is only used for per-operation working directories
//! beneath `staging_dir/{upload,download}`.
//!
//! The operations themselves are split across sibling modules:
//! `upload`, `download`, `deletion`, `listing` and `resolver`.

use crate::services::{metadata::MetadataIndex, resolver, transport::Transport};
use std::{path::PathBuf, sync::Arc};

use crate::services::error::SlicerResult;

/// Default part size: 8 MiB, under the provider's per-attachment ceiling.
pub const DEFAULT_CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// Default name of the grouping container.
pub const DEFAULT_GROUPING_NAME: &str = "UPLOAD";

/// Filesystem and transport knobs shared by every operation.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Root of the transient working directories.
    pub staging_dir: PathBuf,
    /// Where reassembled files are written.
    pub download_dir: PathBuf,
    pub chunk_size: u64,
    pub grouping_name: String,
}

impl PipelineSettings {
    pub fn upload_root(&self) -> PathBuf {
        self.staging_dir.join("upload")
    }

    pub fn download_root(&self) -> PathBuf {
        self.staging_dir.join("download")
    }
}

/// Shared state for every chunked operation.
///
/// Cheap to clone; each request gets its own working directory keyed by
/// object name or container id, so concurrent operations on different
/// objects do not interfere.
#[derive(Clone)]
pub struct SlicerService {
    pub index: Arc<dyn MetadataIndex>,
    pub transport: Arc<dyn Transport>,
    pub settings: Arc<PipelineSettings>,
}

impl SlicerService {
    pub fn new(
        index: Arc<dyn MetadataIndex>,
        transport: Arc<dyn Transport>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            index,
            transport,
            settings: Arc::new(settings),
        }
    }

    /// Resolve a user token (object id, filename or container name) to a
    /// container id. See [`resolver::resolve`].
    pub async fn resolve(&self, token: &str) -> SlicerResult<Option<String>> {
        resolver::resolve(
            self.index.as_ref(),
            self.transport.as_ref(),
            token,
            &self.settings.grouping_name,
        )
        .await
    }
}
