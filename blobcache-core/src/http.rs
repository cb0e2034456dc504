//! reqwest implementation of [`CacheClient`].
//!
//! Endpoint shape: `GET /blobs`, `GET /blobs/:id`, `GET /blobs/:id/download`,
//! `POST /blobs` (multipart), `PATCH /blobs/:id`, `DELETE /blobs/:id`,
//! `GET /containers/:id`, `GET /tags`. Responses wrap their payload in a
//! `data` envelope. Every request carries the caller's bearer token.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::client::{BlobContent, CacheClient, NewBlob};
use crate::error::{Error, Result};
use crate::models::{Blob, Container, MetadataPatch, Tag};
use crate::query::QuerySpec;

/// Default request timeout. The original protocol defines none; this is a
/// single guard against a hung connection, never a retry trigger.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the blobcache service.
#[derive(Debug, Clone)]
pub struct HttpCacheClient {
    client: Client,
    base_url: String,
    token: String,
}

/// Builder for [`HttpCacheClient`].
#[derive(Debug)]
pub struct HttpCacheClientBuilder {
    base_url: String,
    token: String,
    timeout: Duration,
    client: Option<Client>,
}

impl HttpCacheClientBuilder {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            timeout: DEFAULT_TIMEOUT,
            client: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a custom reqwest client, e.g. for TLS or proxy settings.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> Result<HttpCacheClient> {
        let client = match self.client {
            Some(c) => c,
            None => Client::builder().timeout(self.timeout).build()?,
        };
        Ok(HttpCacheClient {
            client,
            base_url: self.base_url,
            token: self.token,
        })
    }
}

impl HttpCacheClient {
    pub fn builder(
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> HttpCacheClientBuilder {
        HttpCacheClientBuilder::new(base_url, token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Maps a non-success status to [`Error::Server`], keeping the server's
    /// message verbatim.
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.text().await {
            Ok(text) if !text.is_empty() => text,
            _ => status
                .canonical_reason()
                .unwrap_or("request rejected")
                .to_string(),
        };
        tracing::error!(status = status.as_u16(), %message, "server rejected request");
        Err(Error::Server {
            status: status.as_u16(),
            message,
        })
    }

    /// Unwraps the `data` member of a response envelope.
    async fn data(response: Response) -> Result<Value> {
        let body: Value = Self::check(response).await?.json().await?;
        body.get("data")
            .cloned()
            .ok_or_else(|| Error::MalformedResponse("response has no data member".into()))
    }

    fn multipart(new: &NewBlob, content: Vec<u8>) -> Form {
        let part = Part::bytes(content).file_name(new.filename.clone());
        let mut form = Form::new()
            .part("file", part)
            .text("filename", new.filename.clone())
            .text("tag", new.tag.clone())
            .text("scope", new.scope.to_string());
        if new.admin {
            form = form.text("admin", "true");
        }
        if let Some(label) = &new.label {
            form = form.text("label", label.clone());
        }
        if let Some(title) = &new.title {
            form = form.text("title", title.clone());
        }
        form
    }
}

#[async_trait]
impl CacheClient for HttpCacheClient {
    async fn get_blob(&self, id: i64) -> Result<Blob> {
        tracing::debug!(id, "fetching blob metadata");
        let response = self
            .client
            .get(self.url(&format!("/blobs/{id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Blob::build(&Self::data(response).await?)
    }

    async fn list_blobs(&self, query: &QuerySpec) -> Result<Vec<Blob>> {
        tracing::debug!(?query, "listing blobs");
        let response = self
            .client
            .get(self.url("/blobs"))
            .query(&query.params())
            .bearer_auth(&self.token)
            .send()
            .await?;
        let data = Self::data(response).await?;
        let entries = data
            .as_array()
            .ok_or_else(|| Error::MalformedResponse("blob list is not an array".into()))?;
        entries.iter().map(Blob::build).collect()
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        tracing::debug!("listing tags");
        let response = self
            .client
            .get(self.url("/tags"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let data = Self::data(response).await?;
        let entries = data
            .as_array()
            .ok_or_else(|| Error::MalformedResponse("tag list is not an array".into()))?;
        entries.iter().map(Tag::build).collect()
    }

    async fn get_container(&self, id: i64) -> Result<Container> {
        tracing::debug!(id, "fetching container");
        let response = self
            .client
            .get(self.url(&format!("/containers/{id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Container::build(&Self::data(response).await?)
    }

    async fn create_blob(&self, new: NewBlob, content: Vec<u8>) -> Result<Blob> {
        tracing::info!(
            filename = %new.filename,
            tag = %new.tag,
            scope = %new.scope,
            bytes = content.len(),
            "creating blob"
        );
        let form = Self::multipart(&new, content);
        let response = self
            .client
            .post(self.url("/blobs"))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;
        Blob::build(&Self::data(response).await?)
    }

    async fn update_blob(
        &self,
        id: i64,
        patch: &MetadataPatch,
        content: Option<Vec<u8>>,
    ) -> Result<Blob> {
        tracing::info!(id, with_content = content.is_some(), "updating blob");
        let request = self
            .client
            .patch(self.url(&format!("/blobs/{id}")))
            .bearer_auth(&self.token);
        let request = match content {
            // Content replacement goes as multipart, metadata fields riding
            // along as form text; a metadata-only patch is a plain JSON body.
            Some(bytes) => {
                let mut form = Form::new().part("file", Part::bytes(bytes));
                for (key, value) in patch.to_body() {
                    if let Value::String(text) = value {
                        form = form.text(key, text);
                    }
                }
                request.multipart(form)
            }
            None => request.json(&patch.to_body()),
        };
        Blob::build(&Self::data(request.send().await?).await?)
    }

    async fn delete_blob(&self, id: i64) -> Result<()> {
        tracing::info!(id, "deleting blob");
        let response = self
            .client
            .delete(self.url(&format!("/blobs/{id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn fetch_content(&self, id: i64) -> Result<BlobContent> {
        tracing::debug!(id, "downloading blob content");
        let response = self
            .client
            .get(self.url(&format!("/blobs/{id}/download")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let response = Self::check(response).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(BlobContent::Buffered(Vec::new()));
        }
        // Spool the body to disk so a file destination can take it with a
        // plain move instead of a second copy.
        let mut tmp = NamedTempFile::new()?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            tmp.write_all(&chunk?)?;
        }
        tmp.flush()?;
        Ok(BlobContent::Spooled(tmp))
    }
}
