//! Message transport used as the storage medium.
//!
//! A container is an addressable channel-like unit holding an ordered history
//! of messages; each message carries at most one part as an attachment.
//! Per-object containers live inside one well-known grouping container.

pub mod discord;
pub mod local;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("malformed provider response: {0}")]
    Malformed(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// A container as seen by the core. Ids are opaque tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRef {
    pub id: String,
    pub name: String,
}

/// One attachment from a container's history.
#[derive(Debug, Clone)]
pub struct PartPayload {
    pub filename: String,
    pub payload: Bytes,
}

/// Provider operations the chunked store relies on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Look up a top-level grouping container by name.
    async fn find_grouping(&self, name: &str) -> TransportResult<Option<ContainerRef>>;

    async fn create_grouping(&self, name: &str) -> TransportResult<ContainerRef>;

    /// Look up a container named `name` inside `grouping_id`.
    async fn find_container_by_name(
        &self,
        grouping_id: &str,
        name: &str,
    ) -> TransportResult<Option<ContainerRef>>;

    async fn find_container_by_id(&self, container_id: &str)
    -> TransportResult<Option<ContainerRef>>;

    async fn create_container(&self, grouping_id: &str, name: &str)
    -> TransportResult<ContainerRef>;

    async fn delete_container(&self, container_id: &str) -> TransportResult<()>;

    /// Send one part as a message with a single attachment named `filename`.
    async fn send_part(
        &self,
        container_id: &str,
        filename: &str,
        payload: Bytes,
    ) -> TransportResult<()>;

    /// Lazily walk every attachment in the container's history.
    fn history<'a>(
        &'a self,
        container_id: &'a str,
        oldest_first: bool,
    ) -> BoxStream<'a, TransportResult<PartPayload>>;

    /// Find the grouping container, creating it when absent.
    async fn ensure_grouping(&self, name: &str) -> TransportResult<ContainerRef> {
        match self.find_grouping(name).await? {
            Some(grouping) => Ok(grouping),
            None => {
                tracing::info!(grouping = name, "creating grouping container");
                self.create_grouping(name).await
            }
        }
    }
}
