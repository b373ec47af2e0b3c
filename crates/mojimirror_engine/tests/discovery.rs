mod common;

use wiremock::MockServer;

use common::{client_for, mount_empty_tail, mount_uniform_listing, requested_pages};
use mojimirror_engine::{find_last_page, DiscoveryError};

// The search assumes the listing has no holes: once a page is empty, every
// higher page is empty too. The remote has never been observed to violate
// this, but it is an assumption, not a guarantee.

#[tokio::test]
async fn finds_the_last_page_from_a_zero_floor() {
    for last_page in [0u64, 1, 7, 12] {
        let server = MockServer::start().await;
        mount_uniform_listing(&server, last_page).await;
        let client = client_for(&server, &server);

        let found = find_last_page(&client, 0).await.expect("discovery");
        assert_eq!(found, last_page, "last page {last_page}");
    }
}

#[tokio::test]
async fn a_stale_floor_far_above_the_end_is_probed_down() {
    let server = MockServer::start().await;
    mount_uniform_listing(&server, 7).await;
    let client = client_for(&server, &server);

    assert_eq!(find_last_page(&client, 1000).await.expect("discovery"), 7);
}

#[tokio::test]
async fn a_floor_exactly_on_the_last_page() {
    let server = MockServer::start().await;
    mount_uniform_listing(&server, 7).await;
    let client = client_for(&server, &server);

    assert_eq!(find_last_page(&client, 7).await.expect("discovery"), 7);
}

#[tokio::test]
async fn a_floor_below_the_last_page_still_expands_upward() {
    let server = MockServer::start().await;
    mount_uniform_listing(&server, 9).await;
    let client = client_for(&server, &server);

    assert_eq!(find_last_page(&client, 3).await.expect("discovery"), 9);
}

#[tokio::test]
async fn an_empty_listing_is_a_hard_error() {
    let server = MockServer::start().await;
    mount_empty_tail(&server).await;
    let client = client_for(&server, &server);

    let err = find_last_page(&client, 0).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::EmptyListing));
}

#[tokio::test]
async fn each_page_is_probed_at_most_once() {
    let server = MockServer::start().await;
    mount_uniform_listing(&server, 5).await;
    let client = client_for(&server, &server);

    assert_eq!(find_last_page(&client, 5).await.expect("discovery"), 5);

    let pages = requested_pages(&server).await;
    let mut seen = std::collections::HashSet::new();
    for page in pages {
        assert!(seen.insert(page), "page {page} fetched twice");
    }
}

#[tokio::test]
async fn a_failing_probe_surfaces_the_cause() {
    let server = MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .respond_with(wiremock::ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let client = client_for(&server, &server);

    let err = find_last_page(&client, 0).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::Probe(_)));
}
