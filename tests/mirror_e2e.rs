//! End-to-end mirroring scenarios against a mocked share service.
//!
//! These tests drive the public API only: configure a mirror, point it
//! at a wiremock server and assert on the resulting tree and statistics.

use std::time::Duration;

use serde_json::json;
use share_dl::{Config, NodeId, ShareMirror, utils};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn create_mirror(server: &MockServer, tweak: impl FnOnce(&mut Config)) -> (ShareMirror, TempDir) {
    let temp_dir = tempfile::tempdir().expect("tempdir");

    let mut config = Config::default();
    config.download_dir = temp_dir.path().join("downloads");
    config.remote.base_url = server.uri();
    config.remote.request_timeout = Duration::from_secs(5);
    config.transfer.workers = 2;
    config.queue.pop_timeout = Duration::from_millis(50);
    config.queue.poll_interval = Duration::from_millis(5);
    tweak(&mut config);

    let mirror = ShareMirror::new(config).await.expect("mirror setup");
    (mirror, temp_dir)
}

async fn mount_file_attrs(server: &MockServer, id: &str, name: &str, size: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v3/onezone/shares/data/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": name,
            "type": "reg",
            "size": size,
        })))
        .mount(server)
        .await;
}

async fn mount_content(server: &MockServer, id: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v3/onezone/shares/data/{id}/content")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn single_file_root_one_worker_one_byte_chunks() {
    let server = MockServer::start().await;
    let body = b"the quick brown fox jumps over the lazy dog";
    mount_file_attrs(&server, "root", "pangram.txt", body.len() as u64).await;
    mount_content(&server, "root", body).await;

    let (mirror, temp) = create_mirror(&server, |config| {
        config.transfer.workers = 1;
        config.transfer.chunk_size = 1;
    })
    .await;

    let stats = mirror.mirror(&NodeId::new("root")).await.expect("run");

    assert!(stats.complete);
    assert_eq!(stats.finished_files, 1);
    assert_eq!(stats.exit_code(), 0);

    let mirrored = std::fs::read(temp.path().join("downloads/pangram.txt")).expect("read");
    assert_eq!(
        mirrored, body,
        "mirrored file must be byte-for-byte identical"
    );
}

#[tokio::test]
async fn directory_listing_paginated_across_three_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/onezone/shares/data/root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "dataset",
            "type": "dir",
            "size": 15,
        })))
        .mount(&server)
        .await;

    // Three listing pages, chained by continuation tokens. The tokened
    // mocks are mounted first so the untokened catch-all serves page 1.
    Mock::given(method("GET"))
        .and(path("/api/v3/onezone/shares/data/root/children"))
        .and(query_param("token", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "children": [{"id": "f3"}, {"id": "f4"}],
            "nextPageToken": "page3",
            "isLast": false,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/onezone/shares/data/root/children"))
        .and(query_param("token", "page3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "children": [{"id": "f5"}],
            "isLast": true,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/onezone/shares/data/root/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "children": [{"id": "f1"}, {"id": "f2"}],
            "nextPageToken": "page2",
            "isLast": false,
        })))
        .expect(1)
        .mount(&server)
        .await;

    for i in 1..=5 {
        let id = format!("f{i}");
        mount_file_attrs(&server, &id, &format!("file{i}.bin"), 3).await;
        mount_content(&server, &id, b"abc").await;
    }

    let (mirror, temp) = create_mirror(&server, |_| {}).await;
    let stats = mirror.mirror(&NodeId::new("root")).await.expect("run");

    assert!(stats.complete);
    assert_eq!(
        stats.finished_files, 5,
        "every child across all pages exactly once"
    );
    assert!(!stats.has_failures());

    let dataset = temp.path().join("downloads/dataset");
    for i in 1..=5 {
        let file = dataset.join(format!("file{i}.bin"));
        assert_eq!(std::fs::read(&file).expect("read"), b"abc");
    }
}

#[tokio::test]
async fn leftover_partial_from_an_earlier_run_is_resumed_with_a_range() {
    let server = MockServer::start().await;
    mount_file_attrs(&server, "root", "big.bin", 8).await;
    // Only the correctly ranged request succeeds; a full re-download
    // would miss this mock and fail the run.
    Mock::given(method("GET"))
        .and(path("/api/v3/onezone/shares/data/root/content"))
        .and(header("Range", "bytes=5-"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(b"efg".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let (mirror, temp) = create_mirror(&server, |_| {}).await;

    // Simulate the previous run's leftover: 5 of 8 bytes staged under
    // the node's stable partial name.
    let downloads = temp.path().join("downloads");
    std::fs::write(utils::partial_path(&downloads, "root"), b"abcde").expect("stage partial");

    let stats = mirror.mirror(&NodeId::new("root")).await.expect("run");

    assert!(stats.complete);
    assert_eq!(stats.finished_files, 1);
    assert_eq!(
        std::fs::read(downloads.join("big.bin")).expect("read"),
        b"abcdeefg"
    );
}

#[tokio::test]
async fn stale_partials_are_swept_while_claimed_ones_survive() {
    let server = MockServer::start().await;
    mount_file_attrs(&server, "root", "real.bin", 2).await;
    mount_content(&server, "root", b"ok").await;

    let (mirror, temp) = create_mirror(&server, |_| {}).await;

    let downloads = temp.path().join("downloads");
    let stale = utils::partial_path(&downloads, "node-from-some-older-run");
    std::fs::write(&stale, b"junk").expect("stage stale partial");

    let stats = mirror.mirror(&NodeId::new("root")).await.expect("run");

    assert!(stats.complete);
    assert!(!stale.exists(), "unclaimed partial must be swept");
    assert!(downloads.join("real.bin").exists());
}

#[tokio::test]
async fn mixed_outcomes_are_all_accounted_in_the_report() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/onezone/shares/data/root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "mixed",
            "type": "dir",
            "size": 10,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/onezone/shares/data/root/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "children": [{"id": "good"}, {"id": "present"}, {"id": "bad"}],
            "isLast": true,
        })))
        .mount(&server)
        .await;

    mount_file_attrs(&server, "good", "good.bin", 4).await;
    mount_content(&server, "good", b"good").await;
    mount_file_attrs(&server, "present", "present.bin", 3).await;
    mount_file_attrs(&server, "bad", "bad.bin", 2).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/onezone/shares/data/bad/content"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (mirror, temp) = create_mirror(&server, |config| {
        config.transfer.max_attempts = 2;
    })
    .await;

    let mixed_dir = temp.path().join("downloads/mixed");
    std::fs::create_dir_all(&mixed_dir).expect("mkdir");
    std::fs::write(mixed_dir.join("present.bin"), b"old").expect("pre-existing");

    let stats = mirror.mirror(&NodeId::new("root")).await.expect("run");

    assert!(stats.complete);
    assert_eq!(stats.finished_files, 1);
    assert_eq!(stats.existing_files, 1);
    assert_eq!(stats.errors.len(), 1);
    assert_eq!(stats.exit_code(), 1);
    assert!(stats.to_string().contains("errors:       1"));
}
