#![doc = "blobcache-core: client logic for the blobcache file-cache service."]

//! This crate contains all decision logic of the blobcache client: the
//! resource model built from server payloads, list-query construction and
//! normalisation, the transfer engine (upload/download with collision
//! handling) and the edit workflow (download, external editor, re-upload).
//!
//! The CLI binary in the `blobcache` crate is a thin shell over these
//! modules; it parses arguments, resolves configuration and prints results.
//!
//! # Usage
//! Construct an [`http::HttpCacheClient`] (or any [`client::CacheClient`])
//! and pass it to the operations in [`transfer`] and [`edit`], or call the
//! trait methods directly for metadata operations.

pub mod client;
pub mod edit;
pub mod error;
pub mod http;
pub mod models;
pub mod query;
pub mod transfer;

pub use error::{Error, Result};
