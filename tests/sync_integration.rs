//! Integration tests for the mirror engine.
//!
//! A wiremock server plays both the listing API and the download host.

use std::path::Path;
use std::time::Duration;

use md5::{Digest, Md5};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use yadsync::{sync_tree, SyncConfig, SyncError};

const LISTING_PATH: &str = "/v1/disk/public/resources/";
const PUBLIC_KEY: &str = "https://disk.yandex.ru/d/test-share";

fn md5_hex(content: &[u8]) -> String {
    format!("{:x}", Md5::digest(content))
}

fn test_config(server: &MockServer, output: &Path) -> SyncConfig {
    SyncConfig {
        public_key: PUBLIC_KEY.to_string(),
        output_dir: output.to_path_buf(),
        api_endpoint: server.uri(),
        retry_delay: Duration::from_millis(10),
        request_timeout: Duration::from_secs(5),
        show_progress: false,
        ..SyncConfig::default()
    }
}

fn file_item(server: &MockServer, name: &str, content: &[u8]) -> Value {
    json!({
        "name": name,
        "type": "file",
        "file": format!("{}/dl/{}", server.uri(), name),
        "size": content.len(),
        "md5": md5_hex(content),
    })
}

fn dir_item(name: &str) -> Value {
    json!({"name": name, "type": "dir"})
}

fn listing_body(items: Vec<Value>) -> Value {
    let total = items.len();
    json!({
        "_embedded": {
            "items": items,
            "limit": 20,
            "offset": 0,
            "total": total,
        },
        "type": "dir",
    })
}

/// Mounts a listing for `remote_path` ("/" for the root) expected `times` times.
async fn mount_listing(server: &MockServer, remote_path: &str, body: Value, times: u64) {
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("public_key", PUBLIC_KEY))
        .and(query_param("path", remote_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_download(server: &MockServer, name: &str, content: &[u8], times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/dl/{}", name)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_mirrors_nested_tree() {
    let server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");

    mount_listing(
        &server,
        "/",
        listing_body(vec![file_item(&server, "a.txt", b"aaaa"), dir_item("sub")]),
        1,
    )
    .await;
    mount_listing(
        &server,
        "/sub",
        listing_body(vec![file_item(&server, "b.txt", b"bee")]),
        1,
    )
    .await;
    mount_download(&server, "a.txt", b"aaaa", 1).await;
    mount_download(&server, "b.txt", b"bee", 1).await;

    let report = sync_tree(&test_config(&server, output.path()))
        .await
        .expect("mirror should succeed");

    assert_eq!(std::fs::read(output.path().join("a.txt")).unwrap(), b"aaaa");
    assert_eq!(
        std::fs::read(output.path().join("sub").join("b.txt")).unwrap(),
        b"bee"
    );
    assert_eq!(report.folders_visited, 2);
    assert_eq!(report.files_downloaded, 2);
    assert_eq!(report.bytes_downloaded, 7);
    assert!(report.digest_mismatches.is_empty());
}

#[tokio::test]
async fn test_second_run_downloads_nothing() {
    let server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");

    mount_listing(
        &server,
        "/",
        listing_body(vec![dir_item("docs"), file_item(&server, "root.bin", b"root")]),
        2,
    )
    .await;
    mount_listing(
        &server,
        "/docs",
        listing_body(vec![file_item(&server, "readme.md", b"# hello")]),
        2,
    )
    .await;
    mount_download(&server, "root.bin", b"root", 1).await;
    mount_download(&server, "readme.md", b"# hello", 1).await;

    let config = test_config(&server, output.path());
    let first = sync_tree(&config).await.expect("first run should succeed");
    assert_eq!(first.files_downloaded, 2);

    let second = sync_tree(&config).await.expect("second run should succeed");
    assert_eq!(second.files_downloaded, 0);
    assert_eq!(second.files_skipped, 2);
    assert_eq!(second.folders_visited, 2);
}

#[tokio::test]
async fn test_same_size_corrupt_file_is_downloaded_again() {
    let server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");
    let content = b"correct bytes";

    mount_listing(
        &server,
        "/",
        listing_body(vec![file_item(&server, "data.bin", content)]),
        2,
    )
    .await;
    mount_download(&server, "data.bin", content, 1).await;

    let local = output.path().join("data.bin");
    std::fs::write(&local, b"corrupt bytes").unwrap();
    assert_eq!(std::fs::metadata(&local).unwrap().len(), content.len() as u64);

    let config = test_config(&server, output.path());
    let report = sync_tree(&config).await.unwrap();
    assert_eq!(report.files_downloaded, 1);
    assert_eq!(md5_hex(&std::fs::read(&local).unwrap()), md5_hex(content));

    let rerun = sync_tree(&config).await.unwrap();
    assert_eq!(rerun.files_downloaded, 0);
    assert_eq!(rerun.files_skipped, 1);
}

#[tokio::test]
async fn test_dry_run_creates_folders_but_writes_no_files() {
    let server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");

    mount_listing(
        &server,
        "/",
        listing_body(vec![
            file_item(&server, "stale.txt", b"new remote version"),
            dir_item("nested"),
        ]),
        1,
    )
    .await;
    mount_listing(
        &server,
        "/nested",
        listing_body(vec![file_item(&server, "fresh.txt", b"fresh")]),
        1,
    )
    .await;
    mount_download(&server, "stale.txt", b"new remote version", 0).await;
    mount_download(&server, "fresh.txt", b"fresh", 0).await;

    let stale = output.path().join("stale.txt");
    std::fs::write(&stale, b"old").unwrap();

    let config = SyncConfig {
        dry_run: true,
        ..test_config(&server, output.path())
    };
    let report = sync_tree(&config).await.unwrap();

    assert_eq!(report.files_would_download, 2);
    assert_eq!(report.files_downloaded, 0);
    assert!(output.path().join("nested").is_dir());
    assert!(!output.path().join("nested").join("fresh.txt").exists());
    assert_eq!(std::fs::read(&stale).unwrap(), b"old");
}

#[tokio::test]
async fn test_plus_in_folder_name_is_requested_encoded() {
    let server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");

    mount_listing(&server, "/", listing_body(vec![dir_item("c++ notes")]), 1).await;
    // Matches only if `+` arrived as %2B; a bare `+` would decode to a space.
    mount_listing(
        &server,
        "/c++ notes",
        listing_body(vec![file_item(&server, "ptr.md", b"pointers")]),
        1,
    )
    .await;
    mount_download(&server, "ptr.md", b"pointers", 1).await;

    let report = sync_tree(&test_config(&server, output.path()))
        .await
        .unwrap();

    assert!(report.unexpected_listings.is_empty());
    assert_eq!(
        std::fs::read(output.path().join("c++ notes").join("ptr.md")).unwrap(),
        b"pointers"
    );
}

#[tokio::test]
async fn test_unexpected_listing_only_prunes_its_subtree() {
    let server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");

    mount_listing(
        &server,
        "/",
        listing_body(vec![dir_item("broken"), dir_item("healthy")]),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("path", "/broken"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Resource not found.",
            "error": "DiskNotFoundError",
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_listing(
        &server,
        "/healthy",
        listing_body(vec![file_item(&server, "ok.txt", b"ok")]),
        1,
    )
    .await;
    mount_download(&server, "ok.txt", b"ok", 1).await;

    let report = sync_tree(&test_config(&server, output.path()))
        .await
        .expect("soft failure should not abort the run");

    assert_eq!(report.unexpected_listings, vec!["broken".to_string()]);
    assert_eq!(report.files_downloaded, 1);
    assert!(output.path().join("broken").is_dir());
    assert_eq!(
        std::fs::read(output.path().join("healthy").join("ok.txt")).unwrap(),
        b"ok"
    );
}

#[tokio::test]
async fn test_download_failure_aborts_run() {
    let server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");

    mount_listing(
        &server,
        "/",
        listing_body(vec![
            file_item(&server, "flaky.bin", b"never arrives"),
            file_item(&server, "later.bin", b"later"),
        ]),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/dl/flaky.bin"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    mount_download(&server, "later.bin", b"later", 0).await;

    let result = sync_tree(&test_config(&server, output.path())).await;

    assert!(matches!(result, Err(SyncError::HttpStatus { .. })));
    assert!(!output.path().join("later.bin").exists());
}

#[tokio::test]
async fn test_download_recovers_from_transient_errors() {
    let server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");

    mount_listing(
        &server,
        "/",
        listing_body(vec![file_item(&server, "retry.bin", b"third time lucky")]),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/dl/retry.bin"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_download(&server, "retry.bin", b"third time lucky", 1).await;

    let report = sync_tree(&test_config(&server, output.path()))
        .await
        .unwrap();

    assert_eq!(report.files_downloaded, 1);
    assert_eq!(
        std::fs::read(output.path().join("retry.bin")).unwrap(),
        b"third time lucky"
    );
}

#[tokio::test]
async fn test_truncated_listing_is_reported_not_paginated() {
    let server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");

    let body = json!({
        "_embedded": {
            "items": [file_item(&server, "first.txt", b"1")],
            "limit": 1,
            "offset": 0,
            "total": 3,
        }
    });
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("path", "/"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;
    mount_download(&server, "first.txt", b"1", 1).await;

    let config = SyncConfig {
        limit: 1,
        ..test_config(&server, output.path())
    };
    let report = sync_tree(&config).await.unwrap();

    assert_eq!(report.truncated_listings, 1);
    assert_eq!(report.files_downloaded, 1);
}

#[tokio::test]
async fn test_invalid_config_fails_before_any_request() {
    let server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = SyncConfig {
        limit: 0,
        ..test_config(&server, output.path())
    };
    let result = sync_tree(&config).await;

    assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
}

/// Request log as "list <path>" for listings and the URL path for downloads.
async fn request_order(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .expect("request recording is enabled")
        .iter()
        .map(|request| {
            if request.url.path() == LISTING_PATH {
                let remote_path = request
                    .url
                    .query_pairs()
                    .find(|(key, _)| key == "path")
                    .map(|(_, value)| value.into_owned())
                    .unwrap_or_default();
                format!("list {}", remote_path)
            } else {
                request.url.path().to_string()
            }
        })
        .collect()
}

#[tokio::test]
async fn test_traversal_is_depth_first_in_listing_order() {
    let server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");

    mount_listing(
        &server,
        "/",
        listing_body(vec![
            file_item(&server, "a", b"a"),
            dir_item("sub"),
            file_item(&server, "c", b"c"),
        ]),
        1,
    )
    .await;
    mount_listing(
        &server,
        "/sub",
        listing_body(vec![file_item(&server, "b", b"b"), dir_item("x y&z%")]),
        1,
    )
    .await;
    mount_listing(
        &server,
        "/sub/x y&z%",
        listing_body(vec![file_item(&server, "d", b"d")]),
        1,
    )
    .await;
    for name in ["a", "b", "c", "d"] {
        mount_download(&server, name, name.as_bytes(), 1).await;
    }

    let report = sync_tree(&test_config(&server, output.path()))
        .await
        .unwrap();
    assert_eq!(report.files_downloaded, 4);

    assert_eq!(
        request_order(&server).await,
        vec![
            "list /",
            "/dl/a",
            "list /sub",
            "/dl/b",
            "list /sub/x y&z%",
            "/dl/d",
            "/dl/c",
        ]
    );
    assert!(output
        .path()
        .join("sub")
        .join("x y&z%")
        .join("d")
        .is_file());
}

#[tokio::test]
async fn test_listing_that_keeps_timing_out_aborts_run() {
    let server = MockServer::start().await;
    let output = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(listing_body(vec![]))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let config = SyncConfig {
        request_timeout: Duration::from_millis(100),
        ..test_config(&server, output.path())
    };
    let result = sync_tree(&config).await;

    match result {
        Err(SyncError::ReqwestError(e)) => assert!(e.is_timeout(), "{}", e),
        other => panic!("expected a timeout error, got {:?}", other),
    }
    assert_eq!(request_order(&server).await.len(), 3);
}
