#![allow(dead_code)]

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

use mojimirror_engine::{ClientSettings, ListingClient};

pub fn entry(name: &str, url: &str, category: &str) -> Value {
    json!({
        "id": 1,
        "name": name,
        "image_url": url,
        "category": { "name": category }
    })
}

/// Matches `GET /emojis.json?page=<n>` for one exact index.
pub struct PageIs(pub u64);

impl Match for PageIs {
    fn matches(&self, request: &Request) -> bool {
        let wanted = self.0.to_string();
        request
            .url
            .query_pairs()
            .any(|(key, value)| key == "page" && value == wanted)
    }
}

/// Matches any page index at or below the given last page.
pub struct PageAtMost(pub u64);

impl Match for PageAtMost {
    fn matches(&self, request: &Request) -> bool {
        request
            .url
            .query_pairs()
            .any(|(key, value)| key == "page" && value.parse::<u64>().map_or(false, |page| page <= self.0))
    }
}

/// Mount one listing page with an explicit body.
pub async fn mount_page(server: &MockServer, page: u64, entries: &[Value]) {
    Mock::given(method("GET"))
        .and(path("/emojis.json"))
        .and(PageIs(page))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries))
        .mount(server)
        .await;
}

/// Every page not covered by a more specific mock is past the end.
pub async fn mount_empty_tail(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/emojis.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Value>::new()))
        .with_priority(250)
        .mount(server)
        .await;
}

/// A listing whose pages `0..=last_page` all return one entry.
pub async fn mount_uniform_listing(server: &MockServer, last_page: u64) {
    Mock::given(method("GET"))
        .and(path("/emojis.json"))
        .and(PageAtMost(last_page))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![entry(
            "parrot",
            "https://emojis.example.com/emojis/parrot.gif",
            "Party Parrot",
        )]))
        .mount(server)
        .await;
    mount_empty_tail(server).await;
}

/// Serve bytes for every asset path.
pub async fn mount_assets(server: &MockServer) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"gifdata".to_vec()))
        .with_priority(250)
        .mount(server)
        .await;
}

pub fn client_for(listing: &MockServer, assets: &MockServer) -> ListingClient {
    ListingClient::new(ClientSettings {
        json_base: listing.uri(),
        asset_base: assets.uri(),
        request_timeout: Duration::from_secs(5),
        user_agent: "mojimirror-tests".to_string(),
    })
    .expect("test client")
}

/// Page indices requested from the listing server, in arrival order.
pub async fn requested_pages(server: &MockServer) -> Vec<u64> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/emojis.json")
        .filter_map(|request| {
            request
                .url
                .query_pairs()
                .find(|(key, _)| key == "page")
                .and_then(|(_, value)| value.parse::<u64>().ok())
        })
        .collect()
}
