//! Command surface and dispatch.
//!
//! [`run`] is the separately callable entrypoint: it takes the parsed
//! [`Cli`] plus an already-constructed client and editor, so tests and
//! embedders inject their own implementations instead of relying on
//! ambient state.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use blobcache_core::client::CacheClient;
use blobcache_core::edit::{edit, Editor};
use blobcache_core::models::{MetadataPatch, Scope};
use blobcache_core::query::{self, ListFilter};
use blobcache_core::transfer::{
    download, upload, CollisionPolicy, Destination, DownloadResult, SourceKind, UploadRequest,
};

/// Manage blobs in the remote file cache.
#[derive(Parser)]
#[clap(name = "blobcache", version, about = "Manages the remote blob file cache")]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Retrieve and filter blobs across the user, group and public scopes
    List {
        /// Restrict results to this tag
        tag: Option<String>,
        /// Restrict results to one scope (user, group or public)
        #[clap(long, short = 's')]
        scope: Option<String>,
        /// Restrict results to this label
        #[clap(long)]
        label: Option<String>,
        /// Also match labels nested under the given label
        #[clap(long)]
        wild: bool,
        /// Request elevated listing (requires an admin credential)
        #[clap(long)]
        admin: bool,
    },
    /// Retrieve all tags
    ListTags,
    /// Get the metadata of a blob by id
    Get { id: i64 },
    /// Get a container and its blob snapshot by id
    Container { id: i64 },
    /// Download a blob by id; PATH may be `-` for standard output
    Download {
        id: i64,
        path: Option<PathBuf>,
        /// Overwrite an existing destination file
        #[clap(long)]
        force: bool,
    },
    /// Upload a file under TAG; FILEPATH may be `-` for standard input
    Upload {
        tag: String,
        filepath: PathBuf,
        /// Name to store the blob under (defaults to the file's basename)
        filename: Option<String>,
        /// Ownership scope of the new blob (user, group or public)
        #[clap(long, short = 's')]
        scope: Option<String>,
        /// Upload with elevated permission (requires an admin credential)
        #[clap(long)]
        admin: bool,
        /// Human-readable title
        #[clap(long)]
        title: Option<String>,
        /// Categorisation label, `/`-separated for hierarchy
        #[clap(long)]
        label: Option<String>,
    },
    /// Delete a blob by id
    Delete { id: i64 },
    /// Update a blob's metadata and edit its content in $EDITOR
    Edit {
        id: i64,
        /// New display filename
        #[clap(long)]
        filename: Option<String>,
        /// New label (pass an empty string to clear)
        #[clap(long)]
        label: Option<String>,
        /// New title (pass an empty string to clear)
        #[clap(long)]
        title: Option<String>,
    },
}

/// Dispatches one parsed command against the given client.
pub async fn run<C, E>(cli: Cli, client: &C, editor: &E) -> Result<()>
where
    C: CacheClient,
    E: Editor,
{
    match cli.command {
        Commands::List {
            tag,
            scope,
            label,
            wild,
            admin,
        } => {
            let filter = ListFilter {
                tag,
                scope: parse_scope(scope.as_deref())?,
                label,
                wildcard: wild,
                admin,
            };
            let blobs = query::list_blobs(client, filter).await?;
            print_json(&blobs)
        }
        Commands::ListTags => {
            let tags = query::list_tags(client).await?;
            print_json(&tags)
        }
        Commands::Get { id } => {
            let blob = client.get_blob(id).await?;
            print_json(&blob)
        }
        Commands::Container { id } => {
            let container = client.get_container(id).await?;
            print_json(&container)
        }
        Commands::Download { id, path, force } => {
            let destination = match path {
                Some(p) if p == Path::new("-") => Destination::Stdout,
                Some(p) => Destination::Path(p),
                None => Destination::Inferred,
            };
            let result = download(
                client,
                id,
                destination,
                CollisionPolicy::Overwrite { force },
            )
            .await?;
            if let DownloadResult::File { path, bytes } = result {
                println!("{} ({bytes} bytes)", path.display());
            }
            Ok(())
        }
        Commands::Upload {
            tag,
            filepath,
            filename,
            scope,
            admin,
            title,
            label,
        } => {
            let scope = parse_scope(scope.as_deref())?.unwrap_or_default();
            let (mut source, kind, name): (Box<dyn Read + Send>, _, _) =
                if filepath == Path::new("-") {
                    let name = filename.unwrap_or_else(|| "-".to_string());
                    (Box::new(std::io::stdin()), SourceKind::Stdin, name)
                } else {
                    let name = filename.unwrap_or_else(|| basename(&filepath));
                    let file = File::open(&filepath)
                        .with_context(|| format!("cannot open {}", filepath.display()))?;
                    (Box::new(file), SourceKind::File, name)
                };
            let request = UploadRequest {
                scope,
                admin,
                label,
                title,
                ..UploadRequest::new(name, tag)
            };
            let blob = upload(client, request, &mut source, kind).await?;
            print_json(&blob)
        }
        Commands::Delete { id } => {
            client.delete_blob(id).await?;
            println!("deleted blob {id}");
            Ok(())
        }
        Commands::Edit {
            id,
            filename,
            label,
            title,
        } => {
            let patch = MetadataPatch {
                filename: filename.into(),
                label: label.into(),
                title: title.into(),
            };
            let outcome = edit(client, id, patch, editor).await?;
            print_json(&outcome.blob)
        }
    }
}

fn parse_scope(scope: Option<&str>) -> Result<Option<Scope>> {
    Ok(scope.map(str::parse).transpose()?)
}

fn basename(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("-")
        .to_string()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
