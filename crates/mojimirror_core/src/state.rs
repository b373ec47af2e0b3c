use crate::view_model::{LogEntry, MirrorView};
use crate::{QueueSnapshot, RunPhase};

/// Accumulated run state. Mutated only through `update`; the app reads it
/// via `view` and `consume_dirty` to coalesce rendering.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MirrorState {
    pub(crate) phase: RunPhase,
    pub(crate) last_page: Option<u64>,
    pub(crate) page_total: Option<u64>,
    pub(crate) expected_total: Option<usize>,
    pub(crate) existing_count: usize,
    pub(crate) pages_fetched: u64,
    pub(crate) current_page: u64,
    pub(crate) page_queue: QueueSnapshot,
    pub(crate) download_queue: QueueSnapshot,
    pub(crate) scheduled_total: usize,
    pub(crate) log_sequence: usize,
    pub(crate) downloads: Vec<LogEntry>,
    pub(crate) errors: Vec<LogEntry>,
    pub(crate) elapsed_seconds: f64,
    pub(crate) completed: bool,
    pub(crate) failure: Option<String>,
    dirty: bool,
}

impl MirrorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> MirrorView {
        MirrorView {
            phase: self.phase,
            last_page: self.last_page,
            page_total: self.page_total,
            expected_total: self.expected_total,
            existing_count: self.existing_count,
            pages_fetched: self.pages_fetched,
            current_page: self.current_page,
            page_queue: self.page_queue,
            download_queue: self.download_queue,
            scheduled_total: self.scheduled_total,
            downloads: self.downloads.clone(),
            errors: self.errors.clone(),
            elapsed_seconds: self.elapsed_seconds,
            completed: self.completed,
            failure: self.failure.clone(),
        }
    }

    /// True once since the last call if anything render-worthy changed.
    pub fn consume_dirty(&mut self) -> bool {
        let was = self.dirty;
        self.dirty = false;
        was
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn next_sequence(&mut self) -> usize {
        let sequence = self.log_sequence;
        self.log_sequence += 1;
        sequence
    }
}
