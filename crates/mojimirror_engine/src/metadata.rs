use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::PageIndex;

/// Kept from the original tool so existing mirrors resume cleanly.
pub const METADATA_FILENAME: &str = ".slackmojis-meta.json";

/// Resume hint persisted at the mirror root after a clean run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub last_page: PageIndex,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed metadata: {0}")]
    Parse(#[from] serde_json::Error),
}

fn metadata_path(root: &Path) -> PathBuf {
    root.join(METADATA_FILENAME)
}

/// `Ok(None)` when no metadata file exists yet.
pub async fn read_run_metadata(root: &Path) -> Result<Option<RunMetadata>, MetadataError> {
    match tokio::fs::read_to_string(metadata_path(root)).await {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub async fn write_run_metadata(root: &Path, last_page: PageIndex) -> Result<(), MetadataError> {
    let payload = RunMetadata {
        last_page,
        updated_at: Some(Utc::now()),
    };
    let mut text = serde_json::to_string_pretty(&payload)?;
    text.push('\n');
    tokio::fs::write(metadata_path(root), text).await?;
    Ok(())
}
