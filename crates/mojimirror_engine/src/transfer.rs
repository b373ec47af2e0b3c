use std::io;
use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use rand::Rng;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use mirror_logging::mirror_debug;

use crate::client::{map_reqwest_error, ClientError, ListingClient};

#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter_ratio: f64,
    pub max_delay: Duration,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            backoff_multiplier: 2.0,
            jitter_ratio: 1.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("write error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
#[error("failed to download {url} after {attempts} attempts")]
pub struct TransferError {
    pub url: String,
    pub attempts: u32,
    #[source]
    pub source: AttemptError,
}

/// Stream one asset to `destination` with bounded retries. Every failed
/// attempt removes the partial file before backing off, so a given path is
/// either complete or absent once this returns.
pub async fn transfer(
    client: &ListingClient,
    url: &str,
    destination: &Path,
    settings: &TransferSettings,
) -> Result<(), TransferError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match attempt_transfer(client, url, destination).await {
            Ok(()) => return Ok(()),
            Err(source) => {
                remove_partial(destination).await;
                if attempt > settings.max_retries {
                    return Err(TransferError {
                        url: url.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
                tokio::time::sleep(backoff_delay(settings, attempt)).await;
            }
        }
    }
}

async fn attempt_transfer(
    client: &ListingClient,
    url: &str,
    destination: &Path,
) -> Result<(), AttemptError> {
    let response = client.fetch_asset(url).await?;
    let mut file = tokio::fs::File::create(destination).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| AttemptError::Client(map_reqwest_error(err)))?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

/// Best effort: a missing file is fine, anything else is logged and ignored.
async fn remove_partial(destination: &Path) {
    if let Err(err) = tokio::fs::remove_file(destination).await {
        if err.kind() != io::ErrorKind::NotFound {
            mirror_debug!("could not remove partial file {:?}: {}", destination, err);
        }
    }
}

/// `min(base * multiplier^(attempt-1), max)`, minus a uniform jitter slice,
/// never below 1ms.
fn backoff_delay(settings: &TransferSettings, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let scaled = settings.base_delay.as_millis() as f64
        * settings.backoff_multiplier.powi(exponent as i32);
    let capped = scaled.min(settings.max_delay.as_millis() as f64);
    let jitter_span = capped * settings.jitter_ratio.clamp(0.0, 1.0);
    let chosen = capped - rand::thread_rng().gen_range(0.0..=jitter_span);
    Duration::from_millis(chosen.max(1.0) as u64)
}
