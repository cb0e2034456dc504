//! The client interface the workflows operate against.
//!
//! [`CacheClient`] is implemented for real use by
//! [`crate::http::HttpCacheClient`] and by a generated mock for tests. The
//! trait is the seam between decision logic (transfer engine, edit
//! workflow) and the wire.

use std::io::Read;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use tempfile::NamedTempFile;

use crate::error::Result;
use crate::models::{Blob, Container, MetadataPatch, Scope, Tag};
use crate::query::QuerySpec;

/// Everything needed to create a blob, minus its content bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBlob {
    pub filename: String,
    pub tag: String,
    pub scope: Scope,
    pub admin: bool,
    pub label: Option<String>,
    pub title: Option<String>,
}

/// Downloaded blob content as handed over by the transport.
///
/// `Spooled` is the fast path: the body already sits in a temporary file
/// and a destination on the same filesystem can take it with a metadata
/// move. `Buffered` is a plain in-memory body.
#[derive(Debug)]
pub enum BlobContent {
    Spooled(NamedTempFile),
    Buffered(Vec<u8>),
}

impl BlobContent {
    /// Content length in bytes.
    pub fn len(&self) -> Result<u64> {
        match self {
            BlobContent::Spooled(tmp) => Ok(tmp.as_file().metadata()?.len()),
            BlobContent::Buffered(buf) => Ok(buf.len() as u64),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Reads the whole content into memory.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            BlobContent::Spooled(tmp) => {
                let mut buf = Vec::new();
                tmp.reopen()?.read_to_end(&mut buf)?;
                Ok(buf)
            }
            BlobContent::Buffered(buf) => Ok(buf),
        }
    }
}

/// Operations the remote cache service offers this client.
///
/// One method per endpoint the client consumes. Implementations do not
/// retry; every error is surfaced to the single in-flight operation.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Fetch one blob's metadata by id.
    async fn get_blob(&self, id: i64) -> Result<Blob>;

    /// List blobs matching the query.
    async fn list_blobs(&self, query: &QuerySpec) -> Result<Vec<Blob>>;

    /// List all tags visible to the caller.
    async fn list_tags(&self) -> Result<Vec<Tag>>;

    /// Fetch a container and its included blob snapshot by id.
    async fn get_container(&self, id: i64) -> Result<Container>;

    /// Create a blob from fully-read content; the returned blob carries the
    /// server-assigned id.
    async fn create_blob(&self, new: NewBlob, content: Vec<u8>) -> Result<Blob>;

    /// Apply a sparse metadata patch and/or replace content, keyed to the
    /// same id. Only `Set` patch fields are transmitted.
    async fn update_blob(
        &self,
        id: i64,
        patch: &MetadataPatch,
        content: Option<Vec<u8>>,
    ) -> Result<Blob>;

    /// Delete a blob by id; the id is invalid afterwards.
    async fn delete_blob(&self, id: i64) -> Result<()>;

    /// Fetch a blob's content.
    async fn fetch_content(&self, id: i64) -> Result<BlobContent>;
}
