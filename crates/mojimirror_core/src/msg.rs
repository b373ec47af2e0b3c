/// Lifecycle phase of one mirroring run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    DeterminingLastPage,
    Fetching,
    Complete,
    Error,
}

/// Occupancy of one of the pipeline's queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueSnapshot {
    pub active: usize,
    pub pending: usize,
}

/// One progress message, mapped from the engine's event stream by the app.
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    PhaseChanged(RunPhase),
    PageTotal(u64),
    LastPage(u64),
    ExpectedTotal(usize),
    ExistingEntries(usize),
    PageProgress { fetched: u64, current: u64 },
    PageQueue(QueueSnapshot),
    PageFailed { page: u64, message: String },
    DownloadsScheduled(usize),
    DownloadQueue(QueueSnapshot),
    DownloadSucceeded { key: String },
    DownloadFailed { key: String, message: String },
    Elapsed { seconds: f64 },
    Fatal { message: String },
    /// Render tick; never changes state.
    Tick,
}
