//! Mirror engine: catalog discovery, transfer pipeline, and adaptive
//! throughput control.
mod categories;
mod client;
mod config;
mod discovery;
mod hint;
mod inventory;
mod listing;
mod metadata;
mod pipeline;
mod queue;
mod targets;
mod throttle;
mod transfer;
mod types;

pub use categories::{is_valid_category, valid_categories, VALID_CATEGORIES};
pub use client::{ClientError, ClientSettings, ListingClient, ASSET_BASE_URL, JSON_BASE_URL};
pub use config::{
    download_throttle, page_throttle, transfer_settings, DEFAULT_DOWNLOAD_CONCURRENCY,
    DEFAULT_PAGE_CONCURRENCY,
};
pub use discovery::{find_last_page, DiscoveryError};
pub use hint::{resolve_last_page_hint, DEFAULT_HINT_URL, MIN_LAST_PAGE_INDEX};
pub use inventory::{ensure_dir, list_inventory};
pub use listing::{fetch_all_entries, DEFAULT_DUMP_PAGE_CONCURRENCY};
pub use metadata::{
    read_run_metadata, write_run_metadata, MetadataError, RunMetadata, METADATA_FILENAME,
};
pub use pipeline::{ChannelEventSink, EventSink, MirrorOptions, MirrorPipeline, PipelineError};
pub use queue::{QueueObserver, TaskQueue};
pub use targets::{
    asset_file_name, build_download_targets, inventory_key, numbered_file_name, DownloadTarget,
};
pub use throttle::{AdaptiveLimiter, LimitObserver, ThrottleSettings};
pub use transfer::{transfer, AttemptError, TransferError, TransferSettings};
pub use types::{
    Category, InventoryKey, ListingEntry, PageIndex, PipelineEvent, PipelineStage, QueueStats,
};
