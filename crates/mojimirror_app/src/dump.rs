use std::sync::Arc;

use anyhow::{Context, Result};
use mirror_logging::mirror_info;
use mojimirror_engine::{
    fetch_all_entries, resolve_last_page_hint, ClientSettings, ListingClient,
    DEFAULT_DUMP_PAGE_CONCURRENCY, DEFAULT_HINT_URL,
};

use crate::cli::Cli;

const DUMP_FILENAME: &str = "emojis.json";

/// Fetch the whole listing and save it as one JSON document.
pub async fn run_dump(cli: &Cli) -> Result<()> {
    let client =
        Arc::new(ListingClient::new(ClientSettings::default()).context("building http client")?);
    let hint = resolve_last_page_hint(&client, DEFAULT_HINT_URL).await;
    let entries = fetch_all_entries(
        &client,
        cli.limit,
        Some(hint),
        DEFAULT_DUMP_PAGE_CONCURRENCY,
    )
    .await
    .context("unable to dump the emoji listing")?;

    let payload = serde_json::to_string(&entries).context("serializing the listing")?;
    tokio::fs::write(DUMP_FILENAME, payload)
        .await
        .with_context(|| format!("writing {DUMP_FILENAME}"))?;
    mirror_info!("wrote {} entries to {}", entries.len(), DUMP_FILENAME);
    Ok(())
}
