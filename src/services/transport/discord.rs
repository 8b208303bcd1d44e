//! Discord REST transport.
//!
//! Categories act as grouping containers and text channels as per-object
//! containers. Each part is sent as one message with a single attachment.
//! Rate limits and other non-2xx answers surface as `TransportError::Api`;
//! nothing here retries.

use super::{ContainerRef, PartPayload, Transport, TransportError, TransportResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{
    StreamExt,
    stream::{self, BoxStream},
};
use reqwest::{
    Client, RequestBuilder, Response, StatusCode,
    header::AUTHORIZATION,
    multipart::{Form, Part},
};
use serde::Deserialize;
use serde_json::json;
use std::collections::VecDeque;
use tracing::debug;

const API_BASE: &str = "https://discord.com/api/v10";
const GUILD_TEXT: u8 = 0;
const GUILD_CATEGORY: u8 = 4;
/// Largest page the message history endpoint returns.
const PAGE_LIMIT: usize = 100;

#[derive(Deserialize, Debug)]
struct Channel {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: u8,
    parent_id: Option<String>,
}

impl From<Channel> for ContainerRef {
    fn from(c: Channel) -> Self {
        ContainerRef {
            id: c.id,
            name: c.name,
        }
    }
}

#[derive(Deserialize, Debug)]
struct Message {
    id: String,
    #[serde(default)]
    attachments: Vec<Attachment>,
}

#[derive(Deserialize, Debug, Clone)]
struct Attachment {
    filename: String,
    url: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Walk position inside a channel's history.
#[derive(Default)]
struct HistoryCursor {
    anchor: Option<String>,
    pending: VecDeque<Attachment>,
    exhausted: bool,
}

#[derive(Clone)]
pub struct DiscordTransport {
    http: Client,
    token: String,
    guild_id: String,
}

impl DiscordTransport {
    pub fn new(token: impl Into<String>, guild_id: impl Into<String>) -> TransportResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("chunkvault/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            token: token.into(),
            guild_id: guild_id.into(),
        })
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(AUTHORIZATION, format!("Bot {}", self.token))
    }

    async fn guild_channels(&self) -> TransportResult<Vec<Channel>> {
        let url = format!("{}/guilds/{}/channels", API_BASE, self.guild_id);
        let resp = check(self.authed(self.http.get(url)).send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn create_channel(
        &self,
        name: &str,
        kind: u8,
        parent_id: Option<&str>,
    ) -> TransportResult<ContainerRef> {
        let url = format!("{}/guilds/{}/channels", API_BASE, self.guild_id);
        let mut body = json!({ "name": name, "type": kind });
        if let Some(parent) = parent_id {
            body["parent_id"] = json!(parent);
        }
        let resp = check(self.authed(self.http.post(url)).json(&body).send().await?).await?;
        let channel: Channel = resp.json().await?;
        debug!(channel_id = %channel.id, name = %channel.name, kind, "created channel");
        Ok(channel.into())
    }

    async fn fetch_page(
        &self,
        channel_id: &str,
        anchor: Option<&str>,
        oldest_first: bool,
    ) -> TransportResult<Vec<Message>> {
        let url = format!("{}/channels/{}/messages", API_BASE, channel_id);
        let mut query = vec![("limit", PAGE_LIMIT.to_string())];
        match (oldest_first, anchor) {
            (true, anchor) => query.push(("after", anchor.unwrap_or("0").to_string())),
            (false, Some(anchor)) => query.push(("before", anchor.to_string())),
            (false, None) => {}
        }
        let resp = check(
            self.authed(self.http.get(url))
                .query(&query)
                .send()
                .await?,
        )
        .await?;
        Ok(resp.json().await?)
    }

    async fn download_attachment(&self, url: &str) -> TransportResult<Bytes> {
        let resp = check(self.http.get(url).send().await?).await?;
        Ok(resp.bytes().await?)
    }

    async fn next_part(
        &self,
        channel_id: &str,
        oldest_first: bool,
        mut cursor: HistoryCursor,
    ) -> TransportResult<Option<(PartPayload, HistoryCursor)>> {
        loop {
            if let Some(attachment) = cursor.pending.pop_front() {
                let payload = self.download_attachment(&attachment.url).await?;
                let part = PartPayload {
                    filename: attachment.filename,
                    payload,
                };
                return Ok(Some((part, cursor)));
            }
            if cursor.exhausted {
                return Ok(None);
            }

            let mut page = self
                .fetch_page(channel_id, cursor.anchor.as_deref(), oldest_first)
                .await?;
            cursor.exhausted = page.len() < PAGE_LIMIT;
            order_page(&mut page, oldest_first);
            match page.last() {
                Some(last) => cursor.anchor = Some(last.id.clone()),
                None => cursor.exhausted = true,
            }
            cursor
                .pending
                .extend(page.into_iter().flat_map(|m| m.attachments));
        }
    }
}

/// Sort one history page by snowflake so pagination anchors stay correct.
fn order_page(page: &mut [Message], oldest_first: bool) {
    page.sort_by_key(|m| m.id.parse::<u64>().unwrap_or(0));
    if !oldest_first {
        page.reverse();
    }
}

/// Turn non-2xx answers into `TransportError::Api`.
async fn check(resp: Response) -> TransportResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = match resp.json::<ApiErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => status.canonical_reason().unwrap_or("unknown error").into(),
    };
    Err(TransportError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl Transport for DiscordTransport {
    async fn find_grouping(&self, name: &str) -> TransportResult<Option<ContainerRef>> {
        Ok(self
            .guild_channels()
            .await?
            .into_iter()
            .find(|c| c.kind == GUILD_CATEGORY && c.name == name)
            .map(Into::into))
    }

    async fn create_grouping(&self, name: &str) -> TransportResult<ContainerRef> {
        self.create_channel(name, GUILD_CATEGORY, None).await
    }

    async fn find_container_by_name(
        &self,
        grouping_id: &str,
        name: &str,
    ) -> TransportResult<Option<ContainerRef>> {
        Ok(self
            .guild_channels()
            .await?
            .into_iter()
            .find(|c| c.parent_id.as_deref() == Some(grouping_id) && c.name == name)
            .map(Into::into))
    }

    async fn find_container_by_id(
        &self,
        container_id: &str,
    ) -> TransportResult<Option<ContainerRef>> {
        let url = format!("{}/channels/{}", API_BASE, container_id);
        let resp = self.authed(self.http.get(url)).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let channel: Channel = check(resp).await?.json().await?;
        Ok(Some(channel.into()))
    }

    async fn create_container(
        &self,
        grouping_id: &str,
        name: &str,
    ) -> TransportResult<ContainerRef> {
        self.create_channel(name, GUILD_TEXT, Some(grouping_id))
            .await
    }

    async fn delete_container(&self, container_id: &str) -> TransportResult<()> {
        let url = format!("{}/channels/{}", API_BASE, container_id);
        check(self.authed(self.http.delete(url)).send().await?).await?;
        Ok(())
    }

    async fn send_part(
        &self,
        container_id: &str,
        filename: &str,
        payload: Bytes,
    ) -> TransportResult<()> {
        let url = format!("{}/channels/{}/messages", API_BASE, container_id);
        let payload_json = json!({ "attachments": [{ "id": 0, "filename": filename }] });
        let form = Form::new()
            .text("payload_json", payload_json.to_string())
            .part("files[0]", Part::bytes(payload.to_vec()).file_name(filename.to_string()));
        check(self.authed(self.http.post(url)).multipart(form).send().await?).await?;
        Ok(())
    }

    fn history<'a>(
        &'a self,
        container_id: &'a str,
        oldest_first: bool,
    ) -> BoxStream<'a, TransportResult<PartPayload>> {
        stream::try_unfold(HistoryCursor::default(), move |cursor| {
            self.next_part(container_id, oldest_first, cursor)
        })
        .boxed()
    }
}
