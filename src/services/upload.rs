//! Upload: split a local file, send its parts to a fresh container and record
//! the object once every part has been transmitted.

use crate::{
    models::{
        object_record::{NewObjectRecord, ObjectRecord},
        progress::TransferDirection,
    },
    services::{
        error::{SlicerError, SlicerResult},
        format::{format_duration, format_size},
        progress::{ProgressSink, ProgressTracker},
        slicer_service::SlicerService,
        splitter::{self, part_file_name},
    },
};
use bytes::Bytes;
use std::{
    io::ErrorKind,
    path::Path,
    time::{Duration, Instant},
};
use tokio::fs;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct UploadReport {
    pub record: ObjectRecord,
    pub bytes: u64,
    pub elapsed: Duration,
}

impl UploadReport {
    /// Terminal status line.
    pub fn describe(&self) -> String {
        format!(
            "Uploaded {} ({}, {} parts) as id {} in {}",
            self.record.file_name(),
            self.record.size_label,
            self.record.part_count.unwrap_or_default(),
            self.record.object_id,
            format_duration(self.elapsed)
        )
    }
}

/// Transport-safe container name: ASCII letters, digits, `_` and `-`, lowercased.
pub fn container_name(base_name: &str) -> String {
    base_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl SlicerService {
    /// Upload `source` on behalf of `owner_id`.
    ///
    /// Nothing is sent before the source, name and uniqueness checks pass. A
    /// failure while sending leaves the container without a record.
    pub async fn upload(
        &self,
        owner_id: &str,
        source: &Path,
        progress: &dyn ProgressSink,
    ) -> SlicerResult<UploadReport> {
        let started = Instant::now();

        let meta = match fs::metadata(source).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(SlicerError::SourceNotFound(source.to_path_buf())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(SlicerError::SourceNotFound(source.to_path_buf()));
            }
            Err(err) => return Err(err.into()),
        };
        if meta.len() == 0 {
            return Err(SlicerError::EmptySource(source.to_path_buf()));
        }

        let base_name = source
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| SlicerError::InvalidObjectName(source.display().to_string()))?;
        let extension = source
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let channel_name = container_name(&base_name);
        if channel_name.is_empty() {
            return Err(SlicerError::InvalidObjectName(base_name));
        }

        let split = splitter::split(
            source,
            &base_name,
            self.settings.chunk_size,
            &self.settings.upload_root(),
        )
        .await?;
        if !split.is_complete() {
            return Err(SlicerError::PartialTransfer {
                expected: split.expected,
                written: split.written,
            });
        }

        let grouping = self
            .transport
            .ensure_grouping(&self.settings.grouping_name)
            .await?;
        if self
            .transport
            .find_container_by_name(&grouping.id, &channel_name)
            .await?
            .is_some()
        {
            error!(name = %channel_name, "file already exists");
            remove_work_dir(&split.dir).await;
            return Err(SlicerError::DuplicateObject(channel_name));
        }
        let container = self
            .transport
            .create_container(&grouping.id, &channel_name)
            .await?;

        info!(
            owner_id,
            container_id = %container.id,
            parts = split.expected,
            "uploading {} parts",
            split.expected
        );
        let mut tracker = ProgressTracker::new(
            TransferDirection::Upload,
            Some(split.expected),
            Some(split.file_size),
        );
        let mut boundary = Instant::now();
        for i in 0..split.expected {
            let part_name = part_file_name(&base_name, i);
            let data = fs::read(split.dir.join(&part_name)).await?;
            let len = data.len() as u64;
            if let Err(err) = self
                .transport
                .send_part(&container.id, &part_name, Bytes::from(data))
                .await
            {
                error!(
                    container_id = %container.id,
                    part_index = i,
                    byte_offset = tracker.bytes_done(),
                    "part transmission failed: {}",
                    err
                );
                return Err(err.into());
            }
            progress.observe(&tracker.record_part(len, boundary.elapsed()));
            boundary = Instant::now();
        }

        let record = self
            .index
            .insert(NewObjectRecord {
                owner_id: owner_id.to_string(),
                container_id: container.id.clone(),
                base_name,
                extension,
                size_label: format_size(split.file_size),
                part_count: split.expected,
            })
            .await
            .inspect_err(|err| {
                error!(container_id = %container.id, "parts sent but record insert failed: {}", err)
            })?;

        remove_work_dir(&split.dir).await;

        let report = UploadReport {
            record,
            bytes: tracker.bytes_done(),
            elapsed: started.elapsed(),
        };
        info!(object_id = report.record.object_id, "{}", report.describe());
        Ok(report)
    }
}

async fn remove_work_dir(dir: &Path) {
    if let Err(err) = fs::remove_dir_all(dir).await {
        if err.kind() != ErrorKind::NotFound {
            warn!("failed to remove working directory {}: {}", dir.display(), err);
        }
    }
}
