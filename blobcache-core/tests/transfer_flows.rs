//! Transfer engine workflows against a mocked client.

use std::fs;
use std::io::Write;

use serial_test::serial;
use tempfile::{tempdir, NamedTempFile};

use blobcache_core::client::{BlobContent, MockCacheClient};
use blobcache_core::models::{Blob, Scope};
use blobcache_core::query::{self, ListFilter};
use blobcache_core::transfer::{
    download, upload, CollisionPolicy, Destination, DownloadResult, SourceKind, UploadRequest,
};
use blobcache_core::Error;

fn blob(id: i64, filename: &str) -> Blob {
    Blob {
        id,
        filename: filename.to_string(),
        title: None,
        label: None,
        tag_name: Some("builds".to_string()),
        scope: Scope::User,
        protected: false,
        size: 0,
    }
}

#[tokio::test]
async fn stdin_upload_without_filename_fails_before_any_request() {
    // No expectations: the mock panics if anything reaches the network.
    let client = MockCacheClient::new();
    let err = upload(
        &client,
        UploadRequest::new("-", "builds"),
        &mut &b"data"[..],
        SourceKind::Stdin,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::MissingFilename));
}

#[tokio::test]
async fn stdin_upload_with_explicit_filename_keeps_the_name() {
    let mut client = MockCacheClient::new();
    client
        .expect_create_blob()
        .withf(|new, content| {
            new.filename == "meta.yml"
                && new.tag == "builds"
                && new.scope == Scope::User
                && content == b"0123456789"
        })
        .times(1)
        .returning(|new, content| {
            let mut created = blob(12, &new.filename);
            created.size = content.len() as u64;
            created.scope = new.scope;
            Ok(created)
        });

    let created = upload(
        &client,
        UploadRequest::new("meta.yml", "builds"),
        &mut &b"0123456789"[..],
        SourceKind::Stdin,
    )
    .await
    .unwrap();
    assert_eq!(created.filename, "meta.yml");
    assert_eq!(created.scope, Scope::User);
    assert_eq!(created.size, 10);
}

#[tokio::test]
async fn file_named_dash_is_allowed_from_a_real_file() {
    let mut client = MockCacheClient::new();
    client
        .expect_create_blob()
        .times(1)
        .returning(|new, _| Ok(blob(1, &new.filename)));
    upload(
        &client,
        UploadRequest::new("-", "builds"),
        &mut &b"x"[..],
        SourceKind::File,
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn download_to_path_writes_the_bytes() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("out.bin");

    let mut client = MockCacheClient::new();
    client
        .expect_fetch_content()
        .times(1)
        .returning(|_| Ok(BlobContent::Buffered(b"0123456789".to_vec())));

    let result = download(
        &client,
        42,
        Destination::Path(target.clone()),
        CollisionPolicy::Overwrite { force: false },
    )
    .await
    .unwrap();

    assert_eq!(
        result,
        DownloadResult::File {
            path: target.clone(),
            bytes: 10
        }
    );
    assert_eq!(fs::read(target).unwrap(), b"0123456789");
}

#[tokio::test]
async fn spooled_content_is_moved_into_place() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("out.bin");

    let mut client = MockCacheClient::new();
    client.expect_fetch_content().times(1).returning(|_| {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(b"spooled body")?;
        tmp.flush()?;
        Ok(BlobContent::Spooled(tmp))
    });

    let result = download(
        &client,
        42,
        Destination::Path(target.clone()),
        CollisionPolicy::Overwrite { force: false },
    )
    .await
    .unwrap();

    assert!(matches!(result, DownloadResult::File { bytes: 12, .. }));
    assert_eq!(fs::read(target).unwrap(), b"spooled body");
}

#[tokio::test]
#[serial]
async fn inferred_destination_uses_the_blob_filename_in_cwd() {
    let dir = tempdir().unwrap();
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let mut client = MockCacheClient::new();
    client
        .expect_get_blob()
        .times(1)
        .returning(|id| Ok(blob(id, "artifact.tar")));
    client
        .expect_fetch_content()
        .times(1)
        .returning(|_| Ok(BlobContent::Buffered(b"0123456789".to_vec())));

    let result = download(
        &client,
        7,
        Destination::Inferred,
        CollisionPolicy::Overwrite { force: false },
    )
    .await;
    std::env::set_current_dir(previous).unwrap();

    let result = result.unwrap();
    assert!(matches!(result, DownloadResult::File { bytes: 10, .. }));
    assert_eq!(fs::read(dir.path().join("artifact.tar")).unwrap().len(), 10);
}

#[tokio::test]
async fn inferred_destination_without_filename_is_an_error() {
    let mut client = MockCacheClient::new();
    client
        .expect_get_blob()
        .times(1)
        .returning(|id| Ok(blob(id, "")));
    let err = download(
        &client,
        7,
        Destination::Inferred,
        CollisionPolicy::Overwrite { force: false },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::MissingFilename));
}

#[tokio::test]
async fn existing_destination_aborts_without_force() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("out.bin");
    fs::write(&target, b"old").unwrap();

    // Collision is detected before any content is fetched.
    let client = MockCacheClient::new();
    let err = download(
        &client,
        42,
        Destination::Path(target.clone()),
        CollisionPolicy::Overwrite { force: false },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::ExistingFile(p) if p == target));
    assert_eq!(fs::read(&target).unwrap(), b"old");
}

#[tokio::test]
async fn force_overwrites_and_auto_rename_picks_next_suffix() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("report.txt");
    fs::write(&target, b"old").unwrap();
    fs::write(dir.path().join("report.txt.1"), b"old").unwrap();
    fs::write(dir.path().join("report.txt.3"), b"old").unwrap();

    let mut client = MockCacheClient::new();
    client
        .expect_fetch_content()
        .times(2)
        .returning(|_| Ok(BlobContent::Buffered(b"new".to_vec())));

    let result = download(
        &client,
        42,
        Destination::Path(target.clone()),
        CollisionPolicy::Overwrite { force: true },
    )
    .await
    .unwrap();
    assert!(matches!(result, DownloadResult::File { .. }));
    assert_eq!(fs::read(&target).unwrap(), b"new");

    let result = download(
        &client,
        42,
        Destination::Path(target.clone()),
        CollisionPolicy::AutoRename,
    )
    .await
    .unwrap();
    let expected = dir.path().join("report.txt.4");
    assert_eq!(
        result,
        DownloadResult::File {
            path: expected.clone(),
            bytes: 3
        }
    );
    assert_eq!(fs::read(expected).unwrap(), b"new");
}

#[tokio::test]
async fn listing_filters_and_sorts_rows() {
    let mut client = MockCacheClient::new();
    client.expect_list_blobs().times(1).returning(|_| {
        let mut nightly = blob(30, "c");
        nightly.label = Some("ci/nightly".to_string());
        let mut exact = blob(4, "a");
        exact.label = Some("ci".to_string());
        let mut cinema = blob(2, "b");
        cinema.label = Some("cinema".to_string());
        Ok(vec![nightly, exact, cinema])
    });

    let filter = ListFilter {
        label: Some("ci".to_string()),
        wildcard: true,
        ..ListFilter::default()
    };
    let blobs = query::list_blobs(&client, filter).await.unwrap();
    let ids: Vec<i64> = blobs.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![4, 30]);
}

#[tokio::test]
async fn wildcard_without_label_never_reaches_the_client() {
    let client = MockCacheClient::new();
    let filter = ListFilter {
        wildcard: true,
        ..ListFilter::default()
    };
    let err = query::list_blobs(&client, filter).await.unwrap_err();
    assert!(matches!(err, Error::InvalidFilterCombination(_)));
}

#[tokio::test]
async fn tags_come_back_sorted_by_name() {
    use blobcache_core::models::Tag;
    let mut client = MockCacheClient::new();
    client.expect_list_tags().times(1).returning(|| {
        Ok(vec![
            Tag {
                name: "zeta".to_string(),
                max_size: 0,
                restricted: false,
            },
            Tag {
                name: "alpha".to_string(),
                max_size: 0,
                restricted: true,
            },
        ])
    });
    let tags = query::list_tags(&client).await.unwrap();
    let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
}
