use crate::view_model::{LogEntry, LogKind};
use crate::{MirrorState, Msg, RunPhase};

/// Pure fold: applies one progress message to the run state.
pub fn update(mut state: MirrorState, msg: Msg) -> MirrorState {
    match msg {
        Msg::PhaseChanged(phase) => {
            state.phase = phase;
            if phase == RunPhase::Complete {
                state.completed = true;
            }
            state.mark_dirty();
        }
        Msg::PageTotal(total) => {
            state.page_total = Some(total);
            state.mark_dirty();
        }
        Msg::LastPage(index) => {
            state.last_page = Some(index);
            state.mark_dirty();
        }
        Msg::ExpectedTotal(count) => {
            state.expected_total = Some(count);
            state.mark_dirty();
        }
        Msg::ExistingEntries(count) => {
            state.existing_count = count;
            state.mark_dirty();
        }
        Msg::PageProgress { fetched, current } => {
            state.pages_fetched = fetched;
            state.current_page = current;
            state.mark_dirty();
        }
        Msg::PageQueue(stats) => {
            state.page_queue = stats;
            state.mark_dirty();
        }
        Msg::PageFailed { page, message } => {
            let key = format!("page-{page}");
            if !state.errors.iter().any(|entry| entry.key == key) {
                let sequence = state.next_sequence();
                let id = state.errors.len();
                state.errors.push(LogEntry {
                    id,
                    sequence,
                    key,
                    kind: LogKind::Error,
                    title: format!("Failed to fetch page {page}: {message}"),
                });
                state.mark_dirty();
            }
        }
        Msg::DownloadsScheduled(count) => {
            state.scheduled_total += count;
            state.mark_dirty();
        }
        Msg::DownloadQueue(stats) => {
            state.download_queue = stats;
            state.mark_dirty();
        }
        Msg::DownloadSucceeded { key } => {
            let sequence = state.next_sequence();
            let id = state.downloads.len();
            state.downloads.push(LogEntry {
                id,
                sequence,
                key: key.clone(),
                kind: LogKind::Success,
                title: format!("✓ {key}"),
            });
            state.mark_dirty();
        }
        Msg::DownloadFailed { key, message } => {
            // One report per inventory key, however often it is retried at
            // higher layers.
            if !state.errors.iter().any(|entry| entry.key == key) {
                let sequence = state.next_sequence();
                let id = state.errors.len();
                state.errors.push(LogEntry {
                    id,
                    sequence,
                    key: key.clone(),
                    kind: LogKind::Error,
                    title: format!("Failed {key}: {message}"),
                });
                state.mark_dirty();
            }
        }
        Msg::Elapsed { seconds } => {
            state.elapsed_seconds = seconds;
            state.mark_dirty();
        }
        Msg::Fatal { message } => {
            let sequence = state.next_sequence();
            let id = state.errors.len();
            let key = format!("fatal-{id}");
            state.phase = RunPhase::Error;
            state.failure = Some(message.clone());
            state.errors.push(LogEntry {
                id,
                sequence,
                key,
                kind: LogKind::Error,
                title: format!("Failed to complete download: {message}"),
            });
            state.mark_dirty();
        }
        Msg::Tick => {}
    }

    state
}
