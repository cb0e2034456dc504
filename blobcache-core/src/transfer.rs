//! The transfer engine: upload and download with collision handling.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::client::{BlobContent, CacheClient, NewBlob};
use crate::error::{Error, Result};
use crate::models::{Blob, Scope};

/// Where upload content comes from. The sentinel filename `-` is only
/// rejected for standard input, where it means no real name was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Stdin,
}

/// Everything an upload needs besides the content itself.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub name: String,
    pub tag: String,
    pub scope: Scope,
    pub admin: bool,
    pub label: Option<String>,
    pub title: Option<String>,
}

impl UploadRequest {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
            scope: Scope::default(),
            admin: false,
            label: None,
            title: None,
        }
    }
}

/// Where a download lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// A literal path.
    Path(PathBuf),
    /// Raw bytes to standard output.
    Stdout,
    /// Derive the filename from the blob and write to the current directory.
    Inferred,
}

/// What to do when the destination path already exists. Exactly one policy
/// applies per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Abort with [`Error::ExistingFile`] unless `force`, then overwrite
    /// and warn.
    Overwrite { force: bool },
    /// Never error: write to `<path>.<n+1>` where `n` is the highest
    /// existing integer suffix among siblings (0 when none).
    AutoRename,
}

/// Outcome of a download.
#[derive(Debug, PartialEq, Eq)]
pub enum DownloadResult {
    File { path: PathBuf, bytes: u64 },
    Stdout { bytes: u64 },
}

/// Uploads fully-consumed content as a new blob. The reader is drained
/// exactly once and left to the caller to close; nothing is re-read on
/// failure.
pub async fn upload<C, R>(
    client: &C,
    request: UploadRequest,
    source: &mut R,
    kind: SourceKind,
) -> Result<Blob>
where
    C: CacheClient + ?Sized,
    R: Read + Send,
{
    if kind == SourceKind::Stdin && request.name == "-" {
        return Err(Error::MissingFilename);
    }
    let mut content = Vec::new();
    source.read_to_end(&mut content)?;
    tracing::info!(
        name = %request.name,
        tag = %request.tag,
        bytes = content.len(),
        "uploading blob"
    );
    client
        .create_blob(
            NewBlob {
                filename: request.name,
                tag: request.tag,
                scope: request.scope,
                admin: request.admin,
                label: request.label,
                title: request.title,
            },
            content,
        )
        .await
}

/// Downloads a blob to the resolved destination.
///
/// Standard output always receives the raw byte stream; for file
/// destinations a spooled body is taken over with a move instead of being
/// copied.
pub async fn download<C>(
    client: &C,
    id: i64,
    destination: Destination,
    policy: CollisionPolicy,
) -> Result<DownloadResult>
where
    C: CacheClient + ?Sized,
{
    let target = match destination {
        Destination::Stdout => {
            let content = client.fetch_content(id).await?;
            let bytes = write_stdout(content)?;
            return Ok(DownloadResult::Stdout { bytes });
        }
        Destination::Path(path) => path,
        Destination::Inferred => {
            let blob = client.get_blob(id).await?;
            if blob.filename.is_empty() {
                return Err(Error::MissingFilename);
            }
            PathBuf::from(blob.filename)
        }
    };
    let target = resolve_collision(target, policy)?;
    let content = client.fetch_content(id).await?;
    let bytes = content.len()?;
    match content {
        BlobContent::Spooled(tmp) => {
            if let Err(e) = tmp.persist(&target) {
                // rename cannot cross filesystems; fall back to a copy
                fs::copy(e.file.path(), &target)?;
            }
        }
        BlobContent::Buffered(buf) => {
            fs::write(&target, &buf)?;
        }
    }
    tracing::info!(id, path = %target.display(), bytes, "blob written");
    Ok(DownloadResult::File {
        path: target,
        bytes,
    })
}

fn write_stdout(content: BlobContent) -> Result<u64> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let bytes = match content {
        BlobContent::Spooled(tmp) => std::io::copy(&mut tmp.reopen()?, &mut out)?,
        BlobContent::Buffered(buf) => {
            out.write_all(&buf)?;
            buf.len() as u64
        }
    };
    out.flush()?;
    Ok(bytes)
}

fn resolve_collision(path: PathBuf, policy: CollisionPolicy) -> Result<PathBuf> {
    if !path.exists() {
        return Ok(path);
    }
    match policy {
        CollisionPolicy::Overwrite { force: false } => Err(Error::ExistingFile(path)),
        CollisionPolicy::Overwrite { force: true } => {
            tracing::warn!(path = %path.display(), "overwriting existing file");
            Ok(path)
        }
        CollisionPolicy::AutoRename => {
            let renamed = next_free_suffix(&path)?;
            tracing::info!(
                path = %path.display(),
                renamed = %renamed.display(),
                "destination exists, auto-renaming"
            );
            Ok(renamed)
        }
    }
}

/// Computes `<path>.<max+1>` where `max` is the highest integer suffix among
/// existing siblings named `<path>.<integer>`, 0 when there are none.
fn next_free_suffix(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or(Error::MissingFilename)?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let prefix = format!("{file_name}.");
    let mut max = 0u64;
    for entry in fs::read_dir(parent)? {
        let entry = entry?;
        if let Some(suffix) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.strip_prefix(&prefix))
        {
            if let Ok(n) = suffix.parse::<u64>() {
                max = max.max(n);
            }
        }
    }
    Ok(parent.join(format!("{file_name}.{}", max + 1)))
}
