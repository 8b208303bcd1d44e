//! Download: fetch every part of a container, then merge them by numeric
//! suffix into the download directory.

use crate::{
    models::progress::TransferDirection,
    services::{
        error::{SlicerError, SlicerResult},
        format::{format_duration, format_size},
        progress::{ProgressSink, ProgressTracker},
        slicer_service::SlicerService,
        splitter::part_index,
    },
};
use futures::StreamExt;
use std::{
    io,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub container_id: String,
    pub output: PathBuf,
    pub parts: u32,
    pub bytes: u64,
    pub elapsed: Duration,
}

impl DownloadReport {
    pub fn describe(&self) -> String {
        format!(
            "Downloaded {} ({}, {} parts) to {} in {}",
            self.output
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            format_size(self.bytes),
            self.parts,
            self.output.display(),
            format_duration(self.elapsed)
        )
    }
}

/// Parts found in a working directory, in merge order.
struct MergePlan {
    parts: Vec<(u64, PathBuf)>,
    /// Base name recovered from the lowest part, for records that are gone.
    fallback_name: Option<String>,
}

impl SlicerService {
    /// Download the object identified by `token` for `requested_by`.
    ///
    /// A missing grouping container or container aborts before anything is
    /// fetched. Fewer or more parts than the record declares, or a merge
    /// failure, keeps the downloaded parts for recovery.
    pub async fn download(
        &self,
        requested_by: &str,
        token: &str,
        progress: &dyn ProgressSink,
    ) -> SlicerResult<DownloadReport> {
        let started = Instant::now();

        let container_id = self
            .resolve(token)
            .await?
            .ok_or_else(|| SlicerError::ObjectNotFound(token.to_string()))?;

        let grouping_name = &self.settings.grouping_name;
        if self.transport.find_grouping(grouping_name).await?.is_none() {
            warn!(grouping = %grouping_name, "no grouping container");
            return Err(SlicerError::GroupingContainerMissing(grouping_name.clone()));
        }
        if self
            .transport
            .find_container_by_id(&container_id)
            .await?
            .is_none()
        {
            warn!(%container_id, "container referenced by metadata is gone");
            return Err(SlicerError::ContainerMissing(container_id));
        }

        let record = self.index.find_by_container(&container_id).await?;
        if record.is_none() {
            warn!(%container_id, "no metadata record, totals unknown");
        }
        let parts_total = record
            .as_ref()
            .and_then(|r| r.part_count)
            .and_then(|n| u32::try_from(n).ok());

        let work_dir = self.settings.download_root().join(&container_id);
        fs::create_dir_all(&work_dir).await?;

        info!(requested_by, %container_id, "downloading parts");
        let mut tracker = ProgressTracker::new(TransferDirection::Download, parts_total, None);
        let mut boundary = Instant::now();
        // Oldest first: parts arrive in upload order.
        let mut history = self.transport.history(&container_id, true);
        while let Some(item) = history.next().await {
            let part = item.inspect_err(|err| {
                error!(
                    %container_id,
                    part_index = tracker.parts_done(),
                    byte_offset = tracker.bytes_done(),
                    "fetching part failed: {}",
                    err
                )
            })?;
            let Some(file_name) = Path::new(&part.filename).file_name() else {
                warn!(filename = %part.filename, "skipping attachment without a usable name");
                continue;
            };
            fs::write(work_dir.join(file_name), &part.payload).await?;
            progress.observe(&tracker.record_part(part.payload.len() as u64, boundary.elapsed()));
            boundary = Instant::now();
        }
        drop(history);

        let plan = plan_merge(&work_dir).await?;
        if plan.parts.is_empty() {
            warn!(%container_id, "no parts found");
            return Err(SlicerError::NoPartsFound(container_id));
        }
        let fetched = u32::try_from(plan.parts.len()).unwrap_or(u32::MAX);
        if let Some(expected) = parts_total.filter(|n| *n != fetched) {
            error!(
                %container_id,
                expected,
                fetched,
                work_dir = %work_dir.display(),
                "part count mismatch, parts kept for recovery"
            );
            return Err(SlicerError::PartialTransfer {
                expected,
                written: fetched,
            });
        }

        let file_name = match (&record, &plan.fallback_name) {
            (Some(rec), _) => rec.file_name(),
            (None, Some(name)) => name.clone(),
            (None, None) => container_id.clone(),
        };
        fs::create_dir_all(&self.settings.download_dir).await?;
        let output = self.settings.download_dir.join(file_name);
        let bytes = merge_parts(&plan.parts, &output).await.map_err(|source| {
            error!(
                %container_id,
                work_dir = %work_dir.display(),
                "merge failed, parts kept for recovery: {}",
                source
            );
            SlicerError::MergeFailed {
                path: output.clone(),
                source,
            }
        })?;

        if let Err(err) = fs::remove_dir_all(&work_dir).await {
            warn!("failed to remove working directory {}: {}", work_dir.display(), err);
        }

        let report = DownloadReport {
            container_id,
            output,
            parts: fetched,
            bytes,
            elapsed: started.elapsed(),
        };
        info!("{}", report.describe());
        Ok(report)
    }
}

/// List part files in `dir` sorted by the integer after their final `_`.
async fn plan_merge(dir: &Path) -> io::Result<MergePlan> {
    let mut parts = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        match part_index(&name) {
            Some(index) => parts.push((index, name)),
            None => warn!(file = %name, "ignoring file without part suffix"),
        }
    }
    parts.sort_by_key(|(index, _)| *index);

    let fallback_name = parts
        .first()
        .and_then(|(_, name)| name.rsplit_once('_'))
        .map(|(base, _)| base.to_string());
    Ok(MergePlan {
        parts: parts
            .into_iter()
            .map(|(index, name)| (index, dir.join(name)))
            .collect(),
        fallback_name,
    })
}

/// Concatenate `parts` into `output`, returning the bytes written.
async fn merge_parts(parts: &[(u64, PathBuf)], output: &Path) -> io::Result<u64> {
    let mut out = fs::File::create(output).await?;
    let mut total = 0;
    for (_, path) in parts {
        let mut input = fs::File::open(path).await?;
        total += tokio::io::copy(&mut input, &mut out).await?;
    }
    out.flush().await?;
    out.sync_all().await?;
    Ok(total)
}
