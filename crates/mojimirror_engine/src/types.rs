use serde::{Deserialize, Serialize};

/// Zero-based index of one page of the remote listing.
pub type PageIndex = u64;

/// Relative `<category>/<fileName>` identity of one mirrored asset.
pub type InventoryKey = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub name: String,
}

/// One catalog record as returned by the remote listing. Sparse records are
/// tolerated at parse time; entries without a usable category or URL are
/// dropped when targets are derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub category: Option<Category>,
}

impl ListingEntry {
    /// Trimmed category name, if the entry carries a non-blank one.
    pub fn category_name(&self) -> Option<&str> {
        let name = self.category.as_ref()?.name.trim();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

/// Point-in-time occupancy of a task queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub active: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    DeterminingLastPage,
    Fetching,
    Complete,
}

/// One observable pipeline transition. Events are ordered by emission within
/// a run; nothing beyond that ordering should be assumed across variants.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Status { stage: PipelineStage },
    PageTotal { total: u64 },
    LastPage { index: PageIndex },
    ExpectedTotal { count: usize },
    ExistingEntries { count: usize },
    PageProgress { fetched: u64, current: u64 },
    PageQueue { stats: QueueStats },
    PageFailed { page: PageIndex, error: String },
    DownloadsScheduled { count: usize },
    DownloadQueue { stats: QueueStats },
    DownloadSucceeded { key: InventoryKey },
    DownloadFailed { key: InventoryKey, error: String },
    Elapsed { seconds: f64 },
    Fatal { error: String },
}
