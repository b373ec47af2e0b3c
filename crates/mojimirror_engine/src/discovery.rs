use std::collections::HashMap;

use thiserror::Error;

use crate::client::{ClientError, ListingClient};
use crate::PageIndex;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("emoji listing appears to be empty")]
    EmptyListing,
    #[error("unable to determine last emoji page")]
    Probe(#[source] ClientError),
}

/// Find the highest page index that still returns entries. The remote
/// exposes no total, so the search expands exponentially from a floor hint
/// and then binary-searches the gap. Relies on the listing having no holes:
/// once a page is empty, every higher page is assumed empty too.
pub async fn find_last_page(
    client: &ListingClient,
    floor: PageIndex,
) -> Result<PageIndex, DiscoveryError> {
    let mut pages = MemoizedPages::new(client);

    if pages.fetch_len(0).await? == 0 {
        return Err(DiscoveryError::EmptyListing);
    }

    // A stale hint may point past the end; halve until a non-empty page
    // anchors the range.
    let mut lower: PageIndex = 0;
    let mut upper: PageIndex = 1;
    if floor > 0 {
        let mut candidate = floor;
        while candidate > 0 {
            if pages.fetch_len(candidate).await? > 0 {
                lower = candidate;
                upper = candidate + 1;
                break;
            }
            candidate /= 2;
        }
    }

    // Double the upper bound until it falls off the end of the listing.
    while pages.fetch_len(upper).await? > 0 {
        lower = upper;
        upper *= 2;
    }

    // Binary search in (lower, upper) for the last non-empty index.
    let mut best = lower;
    let mut low = lower;
    let mut high = upper;
    while low + 1 < high {
        let midpoint = low + (high - low) / 2;
        if pages.fetch_len(midpoint).await? > 0 {
            best = midpoint;
            low = midpoint;
        } else {
            high = midpoint;
        }
    }

    Ok(best)
}

/// One fetch per index per discovery run, even when the expansion and the
/// binary search probe the same page.
struct MemoizedPages<'a> {
    client: &'a ListingClient,
    lengths: HashMap<PageIndex, usize>,
}

impl<'a> MemoizedPages<'a> {
    fn new(client: &'a ListingClient) -> Self {
        Self {
            client,
            lengths: HashMap::new(),
        }
    }

    async fn fetch_len(&mut self, page: PageIndex) -> Result<usize, DiscoveryError> {
        if let Some(len) = self.lengths.get(&page) {
            return Ok(*len);
        }
        let entries = self
            .client
            .fetch_page(page)
            .await
            .map_err(DiscoveryError::Probe)?;
        self.lengths.insert(page, entries.len());
        Ok(entries.len())
    }
}
