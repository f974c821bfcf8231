//! Upload pipeline failure-path tests
//!
//! Exercises the abort behavior of the multipart upload pipeline against a
//! mock API: a rejected initiate makes no part calls, a failed part keeps
//! finalize unreachable, and temporary files survive every failure so a
//! manual retry stays possible.

use exp_uploadr::config::Config;
use exp_uploadr::notion::NotionClient;
use exp_uploadr::upload::{FileUploader, Part, UploadError, UploadSession};
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: &str, scratch: &Path, part_size: u64) -> Config {
    Config {
        notion_token: "secret_test_token".into(),
        database_id: "db-test".into(),
        platform_name: "ci".into(),
        api_base_url: base_url.into(),
        part_size,
        timeout_seconds: 10,
        scratch_dir: scratch.to_path_buf(),
    }
}

fn make_source_dir(root: &Path, bytes: usize) -> std::path::PathBuf {
    let source = root.join("exp");
    std::fs::create_dir(&source).unwrap();
    std::fs::write(source.join("results.bin"), vec![0x42u8; bytes]).unwrap();
    source
}

fn scratch_file_count(scratch: &Path) -> usize {
    std::fs::read_dir(scratch).unwrap().count()
}

#[tokio::test]
async fn initiate_rejection_aborts_before_any_part_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/file_uploads"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(serde_json::json!({ "message": "API token is invalid." })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    // No part upload may ever reach the send endpoint
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let source = make_source_dir(root.path(), 1024);
    let scratch = root.path().join("scratch");
    let config = test_config(&mock_server.uri(), &scratch, 10 * 1024 * 1024);

    let client = NotionClient::new(
        &config.api_base_url,
        &config.notion_token,
        config.request_timeout(),
    )
    .unwrap();
    let mut uploader = FileUploader::new(client, &source, &config);

    let result = uploader.upload().await;
    match result {
        Err(UploadError::Remote { status, .. }) => assert_eq!(status, 401),
        other => panic!("expected Remote error, got {other:?}"),
    }

    // Archive and its single part stay on disk for inspection
    assert_eq!(scratch_file_count(&scratch), 2);
}

#[tokio::test]
async fn failed_part_keeps_finalize_unreachable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/file_uploads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "up-1",
            "upload_url": format!("{}/send", mock_server.uri()),
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Part upload fails persistently; the bounded retry tries 3 times
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(serde_json::json!({ "message": "internal error" })),
        )
        .expect(3)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/file_uploads/up-1/complete"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let source = make_source_dir(root.path(), 1024);
    let scratch = root.path().join("scratch");
    let config = test_config(&mock_server.uri(), &scratch, 10 * 1024 * 1024);

    let client = NotionClient::new(
        &config.api_base_url,
        &config.notion_token,
        config.request_timeout(),
    )
    .unwrap();
    let mut uploader = FileUploader::new(client, &source, &config);

    let result = uploader.upload().await;
    match result {
        Err(UploadError::Remote { status, .. }) => assert_eq!(status, 500),
        other => panic!("expected Remote error, got {other:?}"),
    }

    assert_eq!(scratch_file_count(&scratch), 2);
}

#[tokio::test]
async fn transient_part_failure_recovers_within_retry_budget() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/file_uploads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "up-2",
            "upload_url": format!("{}/send", mock_server.uri()),
        })))
        .mount(&mock_server)
        .await;

    // First attempt fails with a retryable status, second succeeds
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/file_uploads/up-2/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "up-2" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let source = make_source_dir(root.path(), 1024);
    let scratch = root.path().join("scratch");
    let config = test_config(&mock_server.uri(), &scratch, 10 * 1024 * 1024);

    let client = NotionClient::new(
        &config.api_base_url,
        &config.notion_token,
        config.request_timeout(),
    )
    .unwrap();
    let mut uploader = FileUploader::new(client, &source, &config);

    uploader.upload().await.unwrap();
    assert_eq!(uploader.session().unwrap().id(), Some("up-2"));
}

/// Two part files on disk plus a session over them, for driving the state
/// machine directly
fn two_part_session(root: &Path, client: NotionClient) -> (UploadSession, std::path::PathBuf) {
    let archive = root.join("archive.tar");
    std::fs::write(&archive, vec![0x11u8; 20]).unwrap();
    let part1 = root.join("archive.tar.part1");
    let part2 = root.join("archive.tar.part2");
    std::fs::write(&part1, vec![0x11u8; 10]).unwrap();
    std::fs::write(&part2, vec![0x11u8; 10]).unwrap();

    let parts = vec![
        Part {
            number: 1,
            path: part1.clone(),
        },
        Part {
            number: 2,
            path: part2,
        },
    ];
    let session = UploadSession::new(client, archive, parts).unwrap();
    (session, part1)
}

#[tokio::test]
async fn duplicate_part_ack_does_not_unlock_finalize() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/file_uploads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "up-dup",
            "upload_url": format!("{}/send", mock_server.uri()),
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Part 1 is acknowledged twice; part 2 never goes up
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/file_uploads/up-dup/complete"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), root.path(), 10);
    let client = NotionClient::new(
        &config.api_base_url,
        &config.notion_token,
        config.request_timeout(),
    )
    .unwrap();

    let (mut session, part1) = two_part_session(root.path(), client);
    session.initiate("application/pdf").await.unwrap();
    session.upload_part(1, &part1).await.unwrap();
    session.upload_part(1, &part1).await.unwrap();

    // A repeated acknowledgment of part 1 must not count for part 2
    let result = session.finalize().await;
    assert!(matches!(
        result,
        Err(UploadError::InvalidState {
            operation: "finalize",
            ..
        })
    ));
}

#[tokio::test]
async fn part_number_outside_part_list_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/file_uploads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "up-stray",
            "upload_url": format!("{}/send", mock_server.uri()),
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    // The stray part number must be rejected before any bytes move
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let config = test_config(&mock_server.uri(), root.path(), 10);
    let client = NotionClient::new(
        &config.api_base_url,
        &config.notion_token,
        config.request_timeout(),
    )
    .unwrap();

    let (mut session, part1) = two_part_session(root.path(), client);
    session.initiate("application/pdf").await.unwrap();

    let result = session.upload_part(7, &part1).await;
    assert!(matches!(result, Err(UploadError::InvalidParts(_))));
}

#[tokio::test]
async fn attach_failure_keeps_temp_files() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/file_uploads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "up-3",
            "upload_url": format!("{}/send", mock_server.uri()),
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/file_uploads/up-3/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "up-3" })))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/v1/blocks/page-9/children"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(serde_json::json!({ "message": "server error" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let source = make_source_dir(root.path(), 1024);
    let scratch = root.path().join("scratch");
    let config = test_config(&mock_server.uri(), &scratch, 10 * 1024 * 1024);

    let client = NotionClient::new(
        &config.api_base_url,
        &config.notion_token,
        config.request_timeout(),
    )
    .unwrap();
    let mut uploader = FileUploader::new(client, &source, &config);

    uploader.upload().await.unwrap();
    let files_after_upload = scratch_file_count(&scratch);
    assert_eq!(files_after_upload, 2);

    let result = uploader.attach_to_page("page-9", Some("exp")).await;
    match result {
        Err(UploadError::Remote { status, .. }) => assert_eq!(status, 500),
        other => panic!("expected Remote error, got {other:?}"),
    }

    // Cleanup is gated on attach success: nothing was deleted
    assert_eq!(scratch_file_count(&scratch), files_after_upload);
}
