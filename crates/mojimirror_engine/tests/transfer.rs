mod common;

use std::time::{Duration, Instant};

use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::client_for;
use mojimirror_engine::{transfer, AttemptError, ClientError, TransferSettings};

fn fast_settings() -> TransferSettings {
    TransferSettings {
        max_retries: 2,
        base_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter_ratio: 0.0,
        max_delay: Duration::from_secs(1),
    }
}

#[tokio::test]
async fn streams_the_asset_to_the_destination() {
    let assets = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/emojis/parrot.gif"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"gif".to_vec()))
        .mount(&assets)
        .await;
    let client = client_for(&assets, &assets);
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("parrot.gif");

    // Absolute URLs are rebased onto the asset host by path.
    transfer(
        &client,
        "https://emojis.example.com/emojis/parrot.gif",
        &dest,
        &fast_settings(),
    )
    .await
    .expect("transfer");

    assert_eq!(std::fs::read(&dest).unwrap(), b"gif");
}

#[tokio::test]
async fn recovers_after_transient_failures() {
    let assets = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.gif"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&assets)
        .await;
    Mock::given(method("GET"))
        .and(path("/a.gif"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .mount(&assets)
        .await;
    let client = client_for(&assets, &assets);
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("a.gif");

    transfer(&client, "/a.gif", &dest, &fast_settings())
        .await
        .expect("third attempt succeeds");

    assert_eq!(std::fs::read(&dest).unwrap(), b"ok");
    assert_eq!(assets.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn exhausted_retries_fail_with_the_last_cause_and_no_partial_file() {
    let assets = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&assets)
        .await;
    let client = client_for(&assets, &assets);
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("missing.gif");

    let settings = TransferSettings {
        max_retries: 1,
        ..fast_settings()
    };
    let err = transfer(&client, "/missing.gif", &dest, &settings)
        .await
        .unwrap_err();

    assert_eq!(err.attempts, 2);
    assert!(matches!(
        err.source,
        AttemptError::Client(ClientError::Status(404))
    ));
    assert!(!dest.exists());
    assert_eq!(assets.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn an_unwritable_destination_fails_without_clobbering_it() {
    let assets = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
        .mount(&assets)
        .await;
    let client = client_for(&assets, &assets);
    let dir = TempDir::new().unwrap();
    // The destination is an existing directory, so the file create fails and
    // the cleanup pass has nothing it is allowed to remove.
    let dest = dir.path().join("occupied");
    std::fs::create_dir(&dest).unwrap();

    let err = transfer(&client, "/x.gif", &dest, &fast_settings())
        .await
        .unwrap_err();

    assert!(matches!(err.source, AttemptError::Io(_)));
    assert!(dest.is_dir());
}

#[tokio::test]
async fn backoff_grows_between_attempts() {
    let assets = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&assets)
        .await;
    let client = client_for(&assets, &assets);
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("slow.gif");

    let settings = TransferSettings {
        max_retries: 2,
        base_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        jitter_ratio: 0.0,
        max_delay: Duration::from_secs(1),
    };
    let started = Instant::now();
    let _ = transfer(&client, "/slow.gif", &dest, &settings).await;

    // 50ms after the first failure, 100ms after the second.
    assert!(started.elapsed() >= Duration::from_millis(150));
}
