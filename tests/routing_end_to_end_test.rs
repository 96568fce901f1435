//! Watcher to endpoint, through the real filesystem and a mock HTTP server.

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dicom_router::{DicomExtractor, HttpDelivery, Monitor, RoutingTable, Settings};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.stability.check_interval_secs = 0.05;
    settings.stability.stable_duration_secs = 0.2;
    settings.pipeline.drain_interval_secs = 0.2;
    settings.pipeline.request_timeout_secs = 5.0;
    settings.retention.enabled = false;
    settings
}

fn start(settings: &Settings, rules: &str) -> dicom_router::MonitorHandle {
    let table = RoutingTable::from_json(rules).unwrap();
    let delivery = HttpDelivery::new(settings.pipeline.request_timeout(), "image").unwrap();
    Monitor::start(
        settings,
        Arc::new(table),
        Arc::new(DicomExtractor::new()),
        Arc::new(delivery),
    )
    .unwrap()
}

async fn wait_for_requests(server: &MockServer, count: usize) {
    for _ in 0..100 {
        if server.received_requests().await.unwrap().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("expected {count} requests");
}

fn endpoint(server: &MockServer, route: &str) -> String {
    format!("{}{route}", server.uri())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stable_file_posted_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let watch_dir = temp_dir.path().join("d");
    std::fs::create_dir_all(&watch_dir).unwrap();

    let settings = fast_settings();
    let target = endpoint(&server, "/a");
    let rules = common::rules_json(&[(watch_dir.as_path(), "Chest X-Ray", target.as_str())]);
    let handle = start(&settings, &rules);

    let file = watch_dir.join("1.dcm");
    common::write_dicom(&file, "chest   x-ray");

    wait_for_requests(&server, 1).await;
    // Several more drain cycles must not send it again.
    tokio::time::sleep(Duration::from_millis(1000)).await;
    handle.shutdown().await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body = &requests[0].body;
    let expected = std::fs::read(&file).unwrap();
    assert!(
        body.windows(expected.len()).any(|w| w == expected.as_slice()),
        "multipart body does not carry the file bytes"
    );
    let text = String::from_utf8_lossy(body);
    assert!(text.contains("name=\"image\""));
    assert!(text.contains("filename=\"1.dcm\""));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_endpoint_does_not_block_others() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/up"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let first = temp_dir.path().join("first");
    let second = temp_dir.path().join("second");
    std::fs::create_dir_all(&first).unwrap();
    std::fs::create_dir_all(&second).unwrap();

    // The file lands under `first`, yet the rule declared for `second`
    // matches too.
    let down = endpoint(&server, "/down");
    let up = endpoint(&server, "/up");
    let rules = common::rules_json(&[
        (first.as_path(), "Head CT", down.as_str()),
        (second.as_path(), "head-ct", up.as_str()),
    ]);
    let handle = start(&fast_settings(), &rules);

    common::write_dicom(&first.join("scan.DCM"), "HEAD CT");

    wait_for_requests(&server, 2).await;
    handle.shutdown().await;

    let requests = server.received_requests().await.unwrap();
    let paths: Vec<&str> = requests.iter().map(|r| r.url.path()).collect();
    assert_eq!(paths, vec!["/down", "/up"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unmatched_and_foreign_files_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let watch_dir = temp_dir.path().join("d");
    std::fs::create_dir_all(&watch_dir).unwrap();

    let target = endpoint(&server, "/a");
    let rules = common::rules_json(&[(watch_dir.as_path(), "Chest X-Ray", target.as_str())]);
    let handle = start(&fast_settings(), &rules);

    common::write_dicom(&watch_dir.join("knee.dcm"), "Knee MRI");
    std::fs::write(watch_dir.join("notes.txt"), b"chest x-ray").unwrap();
    write_garbage(&watch_dir.join("broken.dcm"));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    handle.shutdown().await;

    assert!(server.received_requests().await.unwrap().is_empty());
}

fn write_garbage(path: &Path) {
    std::fs::write(path, b"not a dicom file").unwrap();
}
