use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Instant;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mirror_logging::{mirror_error, mirror_warn};

use crate::client::ListingClient;
use crate::config;
use crate::discovery::{find_last_page, DiscoveryError};
use crate::hint::{resolve_last_page_hint, DEFAULT_HINT_URL, MIN_LAST_PAGE_INDEX};
use crate::inventory;
use crate::metadata::{read_run_metadata, write_run_metadata};
use crate::queue::{QueueObserver, TaskQueue};
use crate::targets::{build_download_targets, inventory_key, numbered_file_name, DownloadTarget};
use crate::throttle::AdaptiveLimiter;
use crate::transfer::{transfer, TransferSettings};
use crate::types::{
    InventoryKey, ListingEntry, PageIndex, PipelineEvent, PipelineStage, QueueStats,
};

/// Outbound event stream. The pipeline is the sole producer; consumers are
/// passive readers and never answer back.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

pub struct ChannelEventSink {
    tx: std::sync::mpsc::Sender<PipelineEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: std::sync::mpsc::Sender<PipelineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Clone)]
pub struct MirrorOptions {
    /// Mirror root; categories become subdirectories of it.
    pub output_root: PathBuf,
    /// Explicit page ceiling. `Some(0)` completes without fetching anything;
    /// `None` enables last-page discovery.
    pub page_limit: Option<u64>,
    /// Only mirror entries of this category.
    pub category: Option<String>,
    /// Fixed page-fetch concurrency; adaptive when absent.
    pub page_concurrency: Option<usize>,
    /// Fixed download concurrency; adaptive when absent.
    pub download_concurrency: Option<usize>,
    /// Remote resume-hint document; `None` skips the lookup.
    pub hint_url: Option<String>,
    pub transfer: TransferSettings,
}

impl MirrorOptions {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            page_limit: None,
            category: None,
            page_concurrency: None,
            download_concurrency: None,
            hint_url: Some(DEFAULT_HINT_URL.to_string()),
            transfer: config::transfer_settings(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not prepare output directory {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// One mirroring run: discovery, page fetching, and downloads composed over
/// two bounded queues. `start` drives the run to completion; `stop` cancels
/// it cooperatively, after which the returned outcome is simply abandoned.
pub struct MirrorPipeline {
    options: MirrorOptions,
    client: Arc<ListingClient>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl MirrorPipeline {
    pub fn new(options: MirrorOptions, client: Arc<ListingClient>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            options,
            client,
            sink,
            cancel: CancellationToken::new(),
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub async fn start(&self) -> Result<(), PipelineError> {
        match self.run().await {
            Ok(()) => Ok(()),
            Err(err) => {
                if self.cancel.is_cancelled() {
                    return Ok(());
                }
                self.sink.emit(PipelineEvent::Fatal {
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn run(&self) -> Result<(), PipelineError> {
        let bus = Arc::new(EventBus {
            sink: Arc::clone(&self.sink),
            cancel: self.cancel.clone(),
        });
        let output_root = self.options.output_root.clone();

        tokio::fs::create_dir_all(&output_root)
            .await
            .map_err(|source| PipelineError::OutputDir {
                path: output_root.clone(),
                source,
            })?;

        if bus.cancelled() {
            return Ok(());
        }

        let stored_hint = match read_run_metadata(&output_root).await {
            Ok(Some(metadata)) => Some(metadata.last_page),
            Ok(None) => None,
            Err(err) => {
                mirror_warn!("failed to read run metadata: {}", err);
                None
            }
        };

        let max_pages = self.options.page_limit;
        if max_pages == Some(0) {
            bus.emit(PipelineEvent::PageTotal { total: 0 });
            bus.emit(PipelineEvent::Status {
                stage: PipelineStage::Complete,
            });
            return Ok(());
        }

        bus.emit(PipelineEvent::Status {
            stage: PipelineStage::DeterminingLastPage,
        });
        if let Some(total) = max_pages {
            bus.emit(PipelineEvent::PageTotal { total });
        }

        let (download_default, download_tuning) = config::download_throttle();
        let download_observer = Arc::new(QueueEventObserver::new(
            Arc::clone(&bus),
            QueueKind::Download,
        ));
        let download_queue = Arc::new(TaskQueue::with_observer(
            self.options
                .download_concurrency
                .map_or(download_default, |value| value.max(1)),
            Some(Arc::clone(&download_observer) as Arc<dyn QueueObserver>),
        ));

        let (page_default, page_tuning) = config::page_throttle();
        let page_observer = Arc::new(QueueEventObserver::new(Arc::clone(&bus), QueueKind::Page));
        let page_queue = Arc::new(TaskQueue::with_observer(
            self.options
                .page_concurrency
                .map_or(page_default, |value| value.max(1)),
            Some(Arc::clone(&page_observer) as Arc<dyn QueueObserver>),
        ));

        let ctx = Arc::new(RunContext {
            bus: Arc::clone(&bus),
            client: Arc::clone(&self.client),
            output_root: output_root.clone(),
            category: self.options.category.clone(),
            transfer_settings: self.options.transfer.clone(),
            page_queue,
            download_queue,
            page_limiter: OnceLock::new(),
            download_limiter: OnceLock::new(),
            known_total: Mutex::new(max_pages),
            final_last_page: Mutex::new(None),
            page_cache: Mutex::new(HashMap::new()),
            frontier: Mutex::new(Frontier::default()),
            inventory: Mutex::new(Inventory::default()),
            ensured_dirs: Mutex::new(HashSet::new()),
            started_at: Mutex::new(None),
            failed_keys: Mutex::new(HashSet::new()),
            fetched_pages: AtomicU64::new(0),
            scheduled_total: AtomicUsize::new(0),
        });

        if self.options.download_concurrency.is_none() {
            let limiter = AdaptiveLimiter::new(
                Arc::clone(&ctx.download_queue),
                download_default,
                download_tuning,
                None,
            );
            download_observer.attach(&limiter);
            let _ = ctx.download_limiter.set(limiter);
        }

        // Discovery (or direct limit probing) runs concurrently with the
        // page frontier below.
        let probe = spawn_last_page_probe(
            Arc::clone(&ctx),
            max_pages,
            stored_hint,
            self.options.hint_url.clone(),
        );

        let scan_root = output_root.clone();
        let existing = match tokio::task::spawn_blocking(move || inventory::list_inventory(&scan_root))
            .await
        {
            Ok(keys) => keys,
            Err(err) => {
                mirror_error!("inventory scan failed: {}", err);
                Vec::new()
            }
        };
        bus.emit(PipelineEvent::ExistingEntries {
            count: existing.len(),
        });
        {
            let mut inventory = ctx.inventory.lock().expect("inventory poisoned");
            inventory.existing = existing.into_iter().collect();
        }

        if bus.cancelled() {
            return Ok(());
        }

        bus.emit(PipelineEvent::Status {
            stage: PipelineStage::Fetching,
        });

        if self.options.page_concurrency.is_none() {
            let producer = Arc::downgrade(&ctx);
            let limiter = AdaptiveLimiter::new(
                Arc::clone(&ctx.page_queue),
                page_default,
                page_tuning,
                Some(Box::new(move |_limit| {
                    // A raised limit may leave idle capacity; wake the producer.
                    if let Some(ctx) = producer.upgrade() {
                        if !ctx.bus.cancelled() {
                            fill_page_workers(&ctx);
                        }
                    }
                })),
            );
            page_observer.attach(&limiter);
            let _ = ctx.page_limiter.set(limiter);
        }

        fill_page_workers(&ctx);

        ctx.page_queue.drain().await;

        if ctx
            .known_total
            .lock()
            .expect("page total poisoned")
            .is_none()
        {
            bus.emit(PipelineEvent::PageTotal {
                total: ctx.fetched_pages.load(Ordering::Relaxed),
            });
        }
        bus.emit(PipelineEvent::ExpectedTotal {
            count: ctx.scheduled_total.load(Ordering::Relaxed),
        });

        ctx.download_queue.drain().await;

        match probe.await {
            Ok(outcome) => outcome?,
            Err(err) => mirror_error!("last-page probe task failed: {}", err),
        }

        if !bus.cancelled() {
            let last_page = *ctx.final_last_page.lock().expect("last page poisoned");
            if let Some(last_page) = last_page {
                if let Err(err) = write_run_metadata(&output_root, last_page).await {
                    mirror_warn!("failed to write run metadata: {}", err);
                }
            }
        }

        bus.emit(PipelineEvent::Status {
            stage: PipelineStage::Complete,
        });
        Ok(())
    }
}

struct EventBus {
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl EventBus {
    fn emit(&self, event: PipelineEvent) {
        if !self.cancel.is_cancelled() {
            self.sink.emit(event);
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

enum QueueKind {
    Page,
    Download,
}

/// Forwards queue stats to the occupancy event stream and, once attached, to
/// the queue's limiter. Holds the limiter weakly: the limiter owns the queue,
/// and the queue owns this observer.
struct QueueEventObserver {
    bus: Arc<EventBus>,
    kind: QueueKind,
    limiter: OnceLock<Weak<AdaptiveLimiter>>,
}

impl QueueEventObserver {
    fn new(bus: Arc<EventBus>, kind: QueueKind) -> Self {
        Self {
            bus,
            kind,
            limiter: OnceLock::new(),
        }
    }

    fn attach(&self, limiter: &Arc<AdaptiveLimiter>) {
        let _ = self.limiter.set(Arc::downgrade(limiter));
    }
}

impl QueueObserver for QueueEventObserver {
    fn on_stats(&self, stats: QueueStats) {
        if let Some(limiter) = self.limiter.get().and_then(Weak::upgrade) {
            limiter.observe_stats(stats);
        }
        match self.kind {
            QueueKind::Page => self.bus.emit(PipelineEvent::PageQueue { stats }),
            QueueKind::Download => self.bus.emit(PipelineEvent::DownloadQueue { stats }),
        }
    }
}

#[derive(Default)]
struct Frontier {
    next: PageIndex,
    end_reached: bool,
    in_flight: usize,
}

#[derive(Default)]
struct Inventory {
    existing: HashSet<InventoryKey>,
    reserved: HashSet<InventoryKey>,
}

struct ReservedFile {
    key: InventoryKey,
    path: PathBuf,
}

/// Shared state for one run. All reservation bookkeeping happens in short,
/// non-suspending critical sections.
struct RunContext {
    bus: Arc<EventBus>,
    client: Arc<ListingClient>,
    output_root: PathBuf,
    category: Option<String>,
    transfer_settings: TransferSettings,
    page_queue: Arc<TaskQueue>,
    download_queue: Arc<TaskQueue>,
    page_limiter: OnceLock<Arc<AdaptiveLimiter>>,
    download_limiter: OnceLock<Arc<AdaptiveLimiter>>,
    known_total: Mutex<Option<u64>>,
    final_last_page: Mutex<Option<PageIndex>>,
    page_cache: Mutex<HashMap<PageIndex, Vec<ListingEntry>>>,
    frontier: Mutex<Frontier>,
    inventory: Mutex<Inventory>,
    ensured_dirs: Mutex<HashSet<PathBuf>>,
    started_at: Mutex<Option<Instant>>,
    failed_keys: Mutex<HashSet<InventoryKey>>,
    fetched_pages: AtomicU64,
    scheduled_total: AtomicUsize,
}

impl RunContext {
    fn close_frontier(&self) {
        self.frontier.lock().expect("frontier poisoned").end_reached = true;
    }

    /// The known total only ever shrinks from the frontier side; an empty
    /// page is definitive.
    fn lower_page_total(&self, candidate: u64) {
        let lowered = {
            let mut known = self.known_total.lock().expect("page total poisoned");
            if known.map_or(true, |current| candidate < current) {
                *known = Some(candidate);
                true
            } else {
                false
            }
        };
        if lowered {
            self.bus.emit(PipelineEvent::PageTotal { total: candidate });
        }
    }

    async fn ensure_dir(&self, dir: &Path) -> io::Result<()> {
        if self
            .ensured_dirs
            .lock()
            .expect("ensured dirs poisoned")
            .contains(dir)
        {
            return Ok(());
        }
        inventory::ensure_dir(dir).await?;
        self.ensured_dirs
            .lock()
            .expect("ensured dirs poisoned")
            .insert(dir.to_path_buf());
        Ok(())
    }

    fn mark_started(&self) {
        let mut started = self.started_at.lock().expect("start time poisoned");
        if started.is_none() {
            *started = Some(Instant::now());
        }
    }

    fn emit_elapsed(&self) {
        let started = *self.started_at.lock().expect("start time poisoned");
        if let Some(at) = started {
            self.bus.emit(PipelineEvent::Elapsed {
                seconds: at.elapsed().as_secs_f64(),
            });
        }
    }

    fn unreserve(&self, key: &InventoryKey) {
        self.inventory
            .lock()
            .expect("inventory poisoned")
            .reserved
            .remove(key);
    }

    /// One failure event per key; a later entry colliding onto the same key
    /// does not repeat the report.
    fn report_download_failure(&self, key: InventoryKey, error: String) {
        let first = self
            .failed_keys
            .lock()
            .expect("failed keys poisoned")
            .insert(key.clone());
        if first {
            self.bus.emit(PipelineEvent::DownloadFailed { key, error });
        }
    }
}

fn spawn_last_page_probe(
    ctx: Arc<RunContext>,
    max_pages: Option<u64>,
    stored_hint: Option<PageIndex>,
    hint_url: Option<String>,
) -> JoinHandle<Result<(), PipelineError>> {
    tokio::spawn(async move {
        let cancel = ctx.bus.cancel.clone();
        tokio::select! {
            // A stopped run abandons the probe; its outcome is discarded.
            _ = cancel.cancelled() => Ok(()),
            outcome = probe_last_page(ctx, max_pages, stored_hint, hint_url) => outcome,
        }
    })
}

async fn probe_last_page(
    ctx: Arc<RunContext>,
    max_pages: Option<u64>,
    stored_hint: Option<PageIndex>,
    hint_url: Option<String>,
) -> Result<(), PipelineError> {
    let target = match max_pages {
        // An explicit ceiling skips discovery; its last page is still
        // validated by fetching it below.
        Some(limit) => limit.saturating_sub(1),
        None => {
            let remote_hint = match &hint_url {
                Some(url) => resolve_last_page_hint(&ctx.client, url).await,
                None => MIN_LAST_PAGE_INDEX,
            };
            let floor = remote_hint
                .max(stored_hint.unwrap_or(0))
                .max(MIN_LAST_PAGE_INDEX);
            match find_last_page(&ctx.client, floor).await {
                Ok(index) => index,
                Err(err) => {
                    ctx.close_frontier();
                    return Err(PipelineError::Discovery(err));
                }
            }
        }
    };

    if ctx.bus.cancelled() {
        return Ok(());
    }

    match ctx.client.fetch_page(target).await {
        Ok(entries) => {
            if ctx.bus.cancelled() {
                return Ok(());
            }
            ctx.page_cache
                .lock()
                .expect("page cache poisoned")
                .insert(target, entries);
            *ctx.final_last_page.lock().expect("last page poisoned") = Some(target);
            let total_pages = target + 1;
            let raised = {
                let mut known = ctx.known_total.lock().expect("page total poisoned");
                if known.map_or(true, |current| current < total_pages) {
                    *known = Some(total_pages);
                    true
                } else {
                    false
                }
            };
            if raised {
                ctx.bus.emit(PipelineEvent::PageTotal { total: total_pages });
            }
            ctx.bus.emit(PipelineEvent::LastPage { index: target });
            Ok(())
        }
        Err(err) => {
            if max_pages.is_none() {
                ctx.close_frontier();
                Err(PipelineError::Discovery(DiscoveryError::Probe(err)))
            } else {
                mirror_warn!("could not validate page {}: {}", target, err);
                Ok(())
            }
        }
    }
}

/// Admit page fetches up to the page queue's current limit.
fn fill_page_workers(ctx: &Arc<RunContext>) {
    while schedule_page_fetch(ctx) {}
}

fn schedule_page_fetch(ctx: &Arc<RunContext>) -> bool {
    let page_index = {
        let mut frontier = ctx.frontier.lock().expect("frontier poisoned");
        if ctx.bus.cancelled() || frontier.end_reached {
            return false;
        }
        if frontier.in_flight >= ctx.page_queue.concurrency() {
            return false;
        }
        if let Some(total) = *ctx.known_total.lock().expect("page total poisoned") {
            if frontier.next >= total {
                return false;
            }
        }
        let index = frontier.next;
        frontier.next += 1;
        frontier.in_flight += 1;
        index
    };

    let task_ctx = Arc::clone(ctx);
    let _ = ctx.page_queue.push(async move {
        fetch_one_page(&task_ctx, page_index).await;
        {
            task_ctx.frontier.lock().expect("frontier poisoned").in_flight -= 1;
        }
        if !task_ctx.bus.cancelled() {
            fill_page_workers(&task_ctx);
        }
    });
    true
}

async fn fetch_one_page(ctx: &Arc<RunContext>, page_index: PageIndex) {
    if ctx.bus.cancelled() {
        return;
    }
    ctx.bus.emit(PipelineEvent::PageProgress {
        fetched: ctx.fetched_pages.load(Ordering::Relaxed),
        current: page_index + 1,
    });

    let started = Instant::now();
    let cached = ctx
        .page_cache
        .lock()
        .expect("page cache poisoned")
        .remove(&page_index);
    let outcome = match cached {
        Some(entries) => Ok(entries),
        None => ctx.client.fetch_page(page_index).await,
    };

    match outcome {
        Ok(entries) => {
            if ctx.bus.cancelled() {
                return;
            }
            if let Some(limiter) = ctx.page_limiter.get() {
                limiter.record_success(started.elapsed());
            }

            if entries.is_empty() {
                // End of the listing; in-flight fetches for lower indices
                // are left to finish on their own.
                ctx.close_frontier();
                if page_index > 0 {
                    *ctx.final_last_page.lock().expect("last page poisoned") =
                        Some(page_index - 1);
                }
                ctx.lower_page_total(page_index);
                return;
            }

            let prepared =
                build_download_targets(&entries, ctx.category.as_deref(), &ctx.output_root);
            let fresh: Vec<DownloadTarget> = {
                let inventory = ctx.inventory.lock().expect("inventory poisoned");
                prepared
                    .into_iter()
                    .filter(|target| {
                        !inventory
                            .existing
                            .contains(&inventory_key(&target.category, &target.file_name))
                    })
                    .collect()
            };

            if !fresh.is_empty() {
                ctx.bus.emit(PipelineEvent::DownloadsScheduled {
                    count: fresh.len(),
                });
            }
            let scheduled = fresh.len();
            for target in fresh {
                if ctx.bus.cancelled() {
                    break;
                }
                schedule_download(ctx, target);
            }
            ctx.scheduled_total.fetch_add(scheduled, Ordering::Relaxed);

            let fetched = ctx.fetched_pages.fetch_add(1, Ordering::Relaxed) + 1;
            ctx.bus.emit(PipelineEvent::PageProgress {
                fetched,
                current: page_index + 1,
            });
        }
        Err(err) => {
            if ctx.bus.cancelled() {
                return;
            }
            if let Some(limiter) = ctx.page_limiter.get() {
                limiter.record_failure(started.elapsed());
            }
            mirror_warn!("failed to fetch page {}: {}", page_index, err);
            ctx.bus.emit(PipelineEvent::PageFailed {
                page: page_index,
                error: err.to_string(),
            });
        }
    }
}

fn schedule_download(ctx: &Arc<RunContext>, target: DownloadTarget) {
    if ctx.bus.cancelled() {
        return;
    }
    let task_ctx = Arc::clone(ctx);
    let _ = ctx.download_queue.push(async move {
        let ctx = task_ctx;
        if ctx.bus.cancelled() {
            return;
        }
        ctx.mark_started();

        let reserved = match reserve_destination(&ctx, &target).await {
            Ok(reserved) => reserved,
            Err(err) => {
                mirror_warn!("could not prepare {:?}: {}", target.dir, err);
                let key = inventory_key(&target.category, &target.file_name);
                ctx.report_download_failure(key, err.to_string());
                return;
            }
        };

        if ctx.bus.cancelled() {
            ctx.unreserve(&reserved.key);
            return;
        }

        let started = Instant::now();
        match transfer(&ctx.client, &target.url, &reserved.path, &ctx.transfer_settings).await {
            Ok(()) => {
                if ctx.bus.cancelled() {
                    return;
                }
                if let Some(limiter) = ctx.download_limiter.get() {
                    limiter.record_success(started.elapsed());
                }
                {
                    let mut inventory = ctx.inventory.lock().expect("inventory poisoned");
                    inventory.reserved.remove(&reserved.key);
                    inventory.existing.insert(reserved.key.clone());
                }
                ctx.bus.emit(PipelineEvent::DownloadSucceeded { key: reserved.key });
            }
            Err(err) => {
                if let Some(limiter) = ctx.download_limiter.get() {
                    limiter.record_failure(started.elapsed());
                }
                ctx.unreserve(&reserved.key);
                if ctx.bus.cancelled() {
                    return;
                }
                mirror_warn!("failed to download {}: {}", target.url, err);
                ctx.report_download_failure(reserved.key, err.to_string());
            }
        }
        ctx.emit_elapsed();
    });
}

/// Resolve a collision-free destination immediately before transfer: the
/// first numbered name free in both the on-disk inventory and the in-flight
/// reservation set wins, so concurrent resolutions never collide.
async fn reserve_destination(
    ctx: &RunContext,
    target: &DownloadTarget,
) -> io::Result<ReservedFile> {
    ctx.ensure_dir(&target.dir).await?;
    let mut inventory = ctx.inventory.lock().expect("inventory poisoned");
    let mut attempt = 0;
    loop {
        let file_name = numbered_file_name(&target.file_name, attempt);
        let key = inventory_key(&target.category, &file_name);
        if !inventory.existing.contains(&key) && !inventory.reserved.contains(&key) {
            inventory.reserved.insert(key.clone());
            return Ok(ReservedFile {
                key,
                path: target.dir.join(file_name),
            });
        }
        attempt += 1;
    }
}
