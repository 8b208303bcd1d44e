//! Directory-backed transport.
//!
//! Layout beneath `root`:
//! - `{container_id}/container.json` - descriptor (id, name, parent)
//! - `{container_id}/messages/{seq:010}-{filename}` - one file per message
//!
//! Used for development and by the test-suite; behaves like a provider with
//! no per-message size ceiling.

use super::{ContainerRef, PartPayload, Transport, TransportError, TransportResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{
    StreamExt, TryStreamExt,
    stream::{self, BoxStream},
};
use serde::{Deserialize, Serialize};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

const DESCRIPTOR: &str = "container.json";
const MESSAGES: &str = "messages";

#[derive(Serialize, Deserialize, Debug, Clone)]
struct Descriptor {
    id: String,
    name: String,
    parent_id: Option<String>,
}

impl From<Descriptor> for ContainerRef {
    fn from(d: Descriptor) -> Self {
        ContainerRef {
            id: d.id,
            name: d.name,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LocalTransport {
    root: PathBuf,
}

impl LocalTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn container_dir(&self, container_id: &str) -> PathBuf {
        self.root.join(container_id)
    }

    async fn descriptors(&self) -> TransportResult<Vec<Descriptor>> {
        let mut out = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(out),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if let Some(descriptor) = read_descriptor(&entry.path()).await? {
                out.push(descriptor);
            }
        }
        Ok(out)
    }

    async fn create(&self, name: &str, parent_id: Option<&str>) -> TransportResult<ContainerRef> {
        let descriptor = Descriptor {
            id: Uuid::new_v4().simple().to_string(),
            name: name.to_string(),
            parent_id: parent_id.map(str::to_string),
        };
        let dir = self.container_dir(&descriptor.id);
        fs::create_dir_all(dir.join(MESSAGES)).await?;
        let json = serde_json::to_vec_pretty(&descriptor)
            .map_err(|err| TransportError::Malformed(err.to_string()))?;
        fs::write(dir.join(DESCRIPTOR), json).await?;
        debug!(container_id = %descriptor.id, name, "created local container");
        Ok(descriptor.into())
    }
}

async fn read_descriptor(dir: &Path) -> TransportResult<Option<Descriptor>> {
    match fs::read(dir.join(DESCRIPTOR)).await {
        Ok(raw) => serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|err| TransportError::Malformed(err.to_string())),
        Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

fn unknown_container(container_id: &str) -> TransportError {
    TransportError::Api {
        status: 404,
        message: format!("unknown container {}", container_id),
    }
}

/// Message files in send order (or reversed), paired with their attachment name.
async fn list_messages(dir: &Path, oldest_first: bool) -> TransportResult<Vec<(PathBuf, String)>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut messages = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if let Some((_, attachment)) = file_name.split_once('-') {
            messages.push((entry.path(), file_name.clone(), attachment.to_string()));
        }
    }
    messages.sort_by(|a, b| a.1.cmp(&b.1));
    if !oldest_first {
        messages.reverse();
    }
    Ok(messages
        .into_iter()
        .map(|(path, _, attachment)| (path, attachment))
        .collect())
}

#[async_trait]
impl Transport for LocalTransport {
    async fn find_grouping(&self, name: &str) -> TransportResult<Option<ContainerRef>> {
        Ok(self
            .descriptors()
            .await?
            .into_iter()
            .find(|d| d.parent_id.is_none() && d.name == name)
            .map(Into::into))
    }

    async fn create_grouping(&self, name: &str) -> TransportResult<ContainerRef> {
        self.create(name, None).await
    }

    async fn find_container_by_name(
        &self,
        grouping_id: &str,
        name: &str,
    ) -> TransportResult<Option<ContainerRef>> {
        Ok(self
            .descriptors()
            .await?
            .into_iter()
            .find(|d| d.parent_id.as_deref() == Some(grouping_id) && d.name == name)
            .map(Into::into))
    }

    async fn find_container_by_id(
        &self,
        container_id: &str,
    ) -> TransportResult<Option<ContainerRef>> {
        Ok(read_descriptor(&self.container_dir(container_id))
            .await?
            .map(Into::into))
    }

    async fn create_container(
        &self,
        grouping_id: &str,
        name: &str,
    ) -> TransportResult<ContainerRef> {
        self.create(name, Some(grouping_id)).await
    }

    async fn delete_container(&self, container_id: &str) -> TransportResult<()> {
        match fs::remove_dir_all(self.container_dir(container_id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(unknown_container(container_id)),
            Err(err) => Err(err.into()),
        }
    }

    async fn send_part(
        &self,
        container_id: &str,
        filename: &str,
        payload: Bytes,
    ) -> TransportResult<()> {
        let dir = self.container_dir(container_id).join(MESSAGES);
        let seq = match list_messages(&dir, true).await {
            Ok(existing) => existing.len(),
            Err(TransportError::Io(err)) if err.kind() == ErrorKind::NotFound => {
                return Err(unknown_container(container_id));
            }
            Err(err) => return Err(err),
        };
        fs::write(dir.join(format!("{:010}-{}", seq, filename)), &payload).await?;
        Ok(())
    }

    fn history<'a>(
        &'a self,
        container_id: &'a str,
        oldest_first: bool,
    ) -> BoxStream<'a, TransportResult<PartPayload>> {
        let dir = self.container_dir(container_id).join(MESSAGES);
        stream::once(async move { list_messages(&dir, oldest_first).await })
            .map_ok(|messages| stream::iter(messages.into_iter().map(Ok::<_, TransportError>)))
            .try_flatten()
            .and_then(|(path, filename)| async move {
                let payload = fs::read(&path).await?;
                Ok::<_, TransportError>(PartPayload {
                    filename,
                    payload: Bytes::from(payload),
                })
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn containers_are_scoped_to_their_grouping() {
        let dir = tempdir().unwrap();
        let transport = LocalTransport::new(dir.path());

        assert!(transport.find_grouping("UPLOAD").await.unwrap().is_none());
        let grouping = transport.ensure_grouping("UPLOAD").await.unwrap();
        assert_eq!(transport.ensure_grouping("UPLOAD").await.unwrap(), grouping);

        let other = transport.create_grouping("OTHER").await.unwrap();
        let report = transport.create_container(&grouping.id, "report").await.unwrap();

        let found = transport
            .find_container_by_name(&grouping.id, "report")
            .await
            .unwrap();
        assert_eq!(found, Some(report.clone()));
        assert!(
            transport
                .find_container_by_name(&other.id, "report")
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(
            transport.find_container_by_id(&report.id).await.unwrap(),
            Some(report)
        );
    }

    #[tokio::test]
    async fn history_follows_send_order() {
        let dir = tempdir().unwrap();
        let transport = LocalTransport::new(dir.path());
        let grouping = transport.ensure_grouping("UPLOAD").await.unwrap();
        let container = transport.create_container(&grouping.id, "data").await.unwrap();

        for i in 0..12 {
            transport
                .send_part(&container.id, &format!("data_{i}"), Bytes::from(vec![i as u8]))
                .await
                .unwrap();
        }

        let oldest: Vec<String> = transport
            .history(&container.id, true)
            .map_ok(|p| p.filename)
            .try_collect()
            .await
            .unwrap();
        let expected: Vec<String> = (0..12).map(|i| format!("data_{i}")).collect();
        assert_eq!(oldest, expected);

        let newest: Vec<PartPayload> = transport
            .history(&container.id, false)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(newest[0].filename, "data_11");
        assert_eq!(newest[0].payload.as_ref(), &[11u8]);
    }

    #[tokio::test]
    async fn deleting_unknown_container_fails() {
        let dir = tempdir().unwrap();
        let transport = LocalTransport::new(dir.path());
        let err = transport.delete_container("missing").await.unwrap_err();
        assert!(matches!(err, TransportError::Api { status: 404, .. }));
        assert!(transport.find_container_by_id("missing").await.unwrap().is_none());
    }
}
