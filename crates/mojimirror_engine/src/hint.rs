use crate::client::ListingClient;
use crate::PageIndex;

/// Lowest last-page index the catalog has ever been observed at; discovery
/// never needs to start below it.
pub const MIN_LAST_PAGE_INDEX: PageIndex = 199;

/// Published snapshot of a recently observed last page.
pub const DEFAULT_HINT_URL: &str =
    "https://raw.githubusercontent.com/ethanfann/slackmojis-dl/main/data/lastPage.json";

/// Best-effort remote hint; every failure falls back to the bundled floor.
pub async fn resolve_last_page_hint(client: &ListingClient, hint_url: &str) -> PageIndex {
    match fetch_remote_hint(client, hint_url).await {
        Some(value) => value.max(MIN_LAST_PAGE_INDEX),
        None => MIN_LAST_PAGE_INDEX,
    }
}

async fn fetch_remote_hint(client: &ListingClient, hint_url: &str) -> Option<PageIndex> {
    let payload = client.get_json(hint_url).await.ok()?;
    payload.get("lastPage")?.as_u64()
}
