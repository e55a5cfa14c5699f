//! Remote backed by a `folio-mirror` service.
//!
//! Documents and blobs go through the REST API. Change subscriptions open
//! one WebSocket per collection against `/v1/changes` and forward every
//! `changed` message into a broadcast channel.

use super::{Fields, RemoteStore};
use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use folio_engine::{
    Blob, BlobUploaded, ChangeEvent, ClientMessage, CollectionKind, DocCreated, DocFilter,
    LocalId, RemoteDoc, RemoteId, ServerMessage,
};
use futures::{SinkExt, StreamExt};
use reqwest::{header::CONTENT_TYPE, Client, Response};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 64;

/// HTTP client for the mirror service.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: String,
    connect_timeout: Duration,
}

impl HttpRemote {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> RemoteResult<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            connect_timeout: request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, kind: CollectionKind) -> String {
        format!("{}/v1/collections/{}", self.base_url, kind)
    }

    fn doc_url(&self, kind: CollectionKind, remote_id: &str) -> String {
        format!("{}/{}", self.collection_url(kind), remote_id)
    }

    fn blob_url(&self, path: &str) -> String {
        format!("{}/v1/blobs/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn changes_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{ws_base}/v1/changes")
    }
}

/// Turn a non-success response into [`RemoteError::Status`].
async fn check(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn probe(&self) -> RemoteResult<()> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn insert(
        &self,
        kind: CollectionKind,
        local_id: Option<LocalId>,
        fields: Fields,
    ) -> RemoteResult<RemoteId> {
        let mut body = fields;
        body.remove("remoteId");
        if let Some(local_id) = local_id {
            body.insert("localId".into(), Value::from(local_id));
        }

        let response = self
            .client
            .post(self.collection_url(kind))
            .json(&body)
            .send()
            .await?;
        let created: DocCreated = check(response).await?.json().await?;
        debug!(collection = %kind, remote_id = %created.remote_id, "inserted remote document");
        Ok(created.remote_id)
    }

    async fn find(&self, kind: CollectionKind, filter: &DocFilter) -> RemoteResult<Vec<RemoteDoc>> {
        let (name, value) = filter.query_pair();
        let response = self
            .client
            .get(self.collection_url(kind))
            .query(&[(name, value)])
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn list(&self, kind: CollectionKind) -> RemoteResult<Vec<RemoteDoc>> {
        let response = self.client.get(self.collection_url(kind)).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn update(&self, kind: CollectionKind, remote_id: &str, patch: Fields) -> RemoteResult<()> {
        let response = self
            .client
            .patch(self.doc_url(kind, remote_id))
            .json(&patch)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn delete(&self, kind: CollectionKind, remote_id: &str) -> RemoteResult<()> {
        let response = self.client.delete(self.doc_url(kind, remote_id)).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn upload_blob(&self, path: &str, blob: &Blob) -> RemoteResult<String> {
        let response = self
            .client
            .put(self.blob_url(path))
            .header(CONTENT_TYPE, blob.mime.as_str())
            .body(blob.data.clone())
            .send()
            .await?;
        let uploaded: BlobUploaded = check(response).await?.json().await?;
        Ok(uploaded.download_url)
    }

    async fn download_blob(&self, url: &str) -> RemoteResult<Blob> {
        let response = check(self.client.get(url).send().await?).await?;
        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(folio_engine::codec::DEFAULT_MIME)
            .to_string();
        let data = response.bytes().await?;
        Ok(Blob::new(data.to_vec(), mime))
    }

    async fn delete_blob(&self, path: &str) -> RemoteResult<()> {
        let response = self.client.delete(self.blob_url(path)).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        kind: CollectionKind,
    ) -> RemoteResult<broadcast::Receiver<ChangeEvent>> {
        let url = self.changes_url();
        let (socket, _) = timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| RemoteError::Timeout(self.connect_timeout))??;
        let (mut write, mut read) = socket.split();

        let subscribe = serde_json::to_string(&ClientMessage::Subscribe { collection: kind })
            .map_err(RemoteError::decode)?;
        write.send(Message::Text(subscribe)).await?;

        let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(collection = %kind, error = %e, "change feed failed");
                        break;
                    }
                };

                match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(ServerMessage::Changed(event)) if event.collection == kind => {
                        if sender.send(event).is_err() {
                            // Every receiver is gone
                            break;
                        }
                    }
                    Ok(ServerMessage::Error { message }) => {
                        warn!(collection = %kind, %message, "change feed reported an error");
                    }
                    Ok(_) => {}
                    Err(e) => debug!(collection = %kind, error = %e, "ignoring change feed message"),
                }
            }
            debug!(collection = %kind, "change feed closed");
            let _ = write.close().await;
        });

        Ok(receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(base: &str) -> HttpRemote {
        HttpRemote::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn urls() {
        let remote = remote("http://localhost:3000/");
        assert_eq!(remote.base_url(), "http://localhost:3000");
        assert_eq!(
            remote.collection_url(CollectionKind::Albums),
            "http://localhost:3000/v1/collections/albums"
        );
        assert_eq!(
            remote.doc_url(CollectionKind::Videos, "abc"),
            "http://localhost:3000/v1/collections/videos/abc"
        );
        assert_eq!(
            remote.blob_url("photos/1/2"),
            "http://localhost:3000/v1/blobs/photos/1/2"
        );
        assert_eq!(remote.changes_url(), "ws://localhost:3000/v1/changes");
    }

    #[test]
    fn secure_changes_url() {
        let remote = remote("https://mirror.example.com");
        assert_eq!(remote.changes_url(), "wss://mirror.example.com/v1/changes");
    }

    #[tokio::test]
    async fn unreachable_remote_fails_probe() {
        // Nothing listens on port 9 on loopback
        let remote = remote("http://127.0.0.1:9");
        assert!(remote.probe().await.is_err());
    }
}
