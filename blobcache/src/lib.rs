//! blobcache CLI: argument surface and configuration resolution.
//!
//! All decision logic (resource model, queries, transfers, the edit
//! workflow) lives in the `blobcache-core` crate. This crate is strictly
//! CLI glue: clap parsing, host/token resolution and result printing.

pub mod cli;
pub mod config;
