use std::collections::BTreeMap;
use std::sync::Mutex;

use futures_util::future::try_join_all;

use crate::client::{ClientError, ListingClient};
use crate::hint::MIN_LAST_PAGE_INDEX;
use crate::{ListingEntry, PageIndex};

pub const DEFAULT_DUMP_PAGE_CONCURRENCY: usize = 10;

struct DumpState {
    cursor: PageIndex,
    discovered_end: Option<PageIndex>,
    pages: BTreeMap<PageIndex, Vec<ListingEntry>>,
}

/// Gather the whole listing in memory, walking pages with a small worker
/// pool until the first empty page or the effective limit. Without an
/// explicit limit, the hint only widens the walk (never below the bundled
/// floor); an explicit `limit` of zero returns nothing without a request.
pub async fn fetch_all_entries(
    client: &ListingClient,
    limit: Option<u64>,
    last_page_hint: Option<PageIndex>,
    concurrency: usize,
) -> Result<Vec<ListingEntry>, ClientError> {
    if limit == Some(0) {
        return Ok(Vec::new());
    }
    let max_pages = limit;
    let clamped_limit = max_pages
        .or_else(|| last_page_hint.map(|hint| hint + 1))
        .map(|pages| pages.max(MIN_LAST_PAGE_INDEX + 1));

    let mut workers = concurrency.max(1) as u64;
    if let Some(cap) = clamped_limit {
        workers = workers.min(cap);
    }

    let state = Mutex::new(DumpState {
        cursor: 0,
        discovered_end: None,
        pages: BTreeMap::new(),
    });

    let worker_loops = (0..workers.max(1)).map(|_| async {
        loop {
            let page_index = {
                let mut state = state.lock().expect("dump state poisoned");
                if let Some(end) = state.discovered_end {
                    if state.cursor >= end {
                        break;
                    }
                }
                if let Some(cap) = max_pages {
                    if state.cursor >= cap {
                        break;
                    }
                }
                if let Some(cap) = clamped_limit {
                    if state.cursor >= cap {
                        break;
                    }
                }
                let index = state.cursor;
                state.cursor += 1;
                index
            };

            let entries = client.fetch_page(page_index).await?;

            let mut state = state.lock().expect("dump state poisoned");
            if entries.is_empty() {
                if state
                    .discovered_end
                    .map_or(true, |end| page_index < end)
                {
                    state.discovered_end = Some(page_index);
                }
                break;
            }
            state.pages.insert(page_index, entries);
        }
        Ok::<(), ClientError>(())
    });
    try_join_all(worker_loops).await?;

    let state = state.into_inner().expect("dump state poisoned");
    let effective_end = state.discovered_end.or(max_pages).or(clamped_limit);
    Ok(state
        .pages
        .into_iter()
        .filter(|(index, _)| effective_end.map_or(true, |end| *index < end))
        .flat_map(|(_, entries)| entries)
        .collect())
}
