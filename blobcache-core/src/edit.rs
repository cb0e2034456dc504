//! The edit workflow: sparse metadata update, then download, external
//! editor, re-upload of the content, as one logical operation.
//!
//! The two halves are not transactional. If the metadata update commits and
//! the content half then fails, the error carries `metadata_updated: true`
//! so the caller retries only the content step.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use tempfile::NamedTempFile;

use crate::client::{BlobContent, CacheClient};
use crate::error::{Error, Result};
use crate::models::{Blob, MetadataPatch};

/// Opens a file in some external editor and returns once the user is done.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Editor: Send + Sync {
    fn open(&self, path: &Path) -> Result<()>;
}

/// Runs `$VISUAL`, falling back to `$EDITOR`, falling back to `vi`.
#[derive(Debug, Clone)]
pub struct ShellEditor {
    program: String,
}

impl ShellEditor {
    pub fn from_env() -> Self {
        let program = std::env::var("VISUAL")
            .or_else(|_| std::env::var("EDITOR"))
            .unwrap_or_else(|_| "vi".to_string());
        Self { program }
    }

    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Editor for ShellEditor {
    fn open(&self, path: &Path) -> Result<()> {
        tracing::info!(program = %self.program, path = %path.display(), "launching editor");
        let status = Command::new(&self.program)
            .arg(path)
            .status()
            .map_err(|e| Error::Editor(format!("failed to launch {}: {e}", self.program)))?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::Editor(format!(
                "{} exited with {status}",
                self.program
            )))
        }
    }
}

/// What an edit accomplished.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    /// The blob as returned by the final content upload.
    pub blob: Blob,
    /// Whether a metadata patch was sent (and therefore committed) first.
    pub metadata_updated: bool,
}

/// Edits a blob: applies the metadata patch if it has any set field, then
/// downloads the current content into a scoped temporary file, hands it to
/// the editor and re-uploads it under the same id. The temporary file is
/// removed on every exit path.
pub async fn edit<C, E>(
    client: &C,
    id: i64,
    patch: MetadataPatch,
    editor: &E,
) -> Result<EditOutcome>
where
    C: CacheClient + ?Sized,
    E: Editor + ?Sized,
{
    let metadata_updated = !patch.is_empty();
    if metadata_updated {
        let blob = client.update_blob(id, &patch, None).await?;
        tracing::info!(id = blob.id, "blob metadata updated");
    }

    match edit_content(client, id, editor).await {
        Ok(blob) => Ok(EditOutcome {
            blob,
            metadata_updated,
        }),
        Err(source) => Err(Error::ContentEdit {
            metadata_updated,
            source: Box::new(source),
        }),
    }
}

async fn edit_content<C, E>(client: &C, id: i64, editor: &E) -> Result<Blob>
where
    C: CacheClient + ?Sized,
    E: Editor + ?Sized,
{
    let tmp = match client.fetch_content(id).await? {
        BlobContent::Spooled(tmp) => tmp,
        BlobContent::Buffered(buf) => {
            let mut tmp = NamedTempFile::new()?;
            tmp.write_all(&buf)?;
            tmp.flush()?;
            tmp
        }
    };
    editor.open(tmp.path())?;
    let content = fs::read(tmp.path())?;
    client
        .update_blob(id, &MetadataPatch::default(), Some(content))
        .await
    // tmp drops here, removing the file whether or not the upload succeeded
}
