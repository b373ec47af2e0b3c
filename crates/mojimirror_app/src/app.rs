use std::sync::{mpsc, Arc};

use anyhow::{Context, Result};
use mirror_logging::{mirror_error, mirror_info, mirror_warn};
use mojimirror_core::{update, MirrorState, MirrorView, Msg, QueueSnapshot, RunPhase};
use mojimirror_engine::{
    ChannelEventSink, ClientSettings, ListingClient, MirrorOptions, MirrorPipeline, PipelineEvent,
    PipelineStage, QueueStats,
};

use crate::cli::Cli;

pub async fn run_mirror(cli: Cli) -> Result<()> {
    let client =
        Arc::new(ListingClient::new(ClientSettings::default()).context("building http client")?);

    let mut options = MirrorOptions::new(cli.output_root());
    options.page_limit = cli.limit;
    options.category = cli.category.clone();
    options.page_concurrency = cli.page_concurrency;
    options.download_concurrency = cli.download_concurrency;

    let (tx, rx) = mpsc::channel();
    let sink = Arc::new(ChannelEventSink::new(tx));
    let pipeline = Arc::new(MirrorPipeline::new(options, client, sink));

    let watcher = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                mirror_warn!("interrupt received; stopping");
                pipeline.stop();
            }
        })
    };

    let runner = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.start().await })
    };

    // Fold events into the view state off the runtime; the channel closes
    // once every pipeline handle (and with them the sink) is gone.
    let fold = tokio::task::spawn_blocking(move || {
        let mut state = MirrorState::new();
        while let Ok(event) = rx.recv() {
            log_event(&event);
            state = update(state, to_msg(event));
        }
        state
    });

    let outcome = runner.await;
    watcher.abort();
    let _ = watcher.await;
    drop(pipeline);

    let state = fold.await.context("event fold failed")?;
    summarize(&state.view());

    match outcome {
        Ok(result) => result.map_err(Into::into),
        Err(err) => Err(err.into()),
    }
}

fn log_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::Status { stage } => mirror_info!("status: {:?}", stage),
        PipelineEvent::PageTotal { total } => mirror_info!("page total: {}", total),
        PipelineEvent::LastPage { index } => mirror_info!("last page: {}", index),
        PipelineEvent::ExistingEntries { count } => mirror_info!("existing files: {}", count),
        PipelineEvent::DownloadSucceeded { key } => mirror_info!("downloaded {}", key),
        PipelineEvent::DownloadFailed { key, error } => mirror_warn!("failed {}: {}", key, error),
        PipelineEvent::PageFailed { page, error } => {
            mirror_warn!("page {} failed: {}", page, error)
        }
        PipelineEvent::Fatal { error } => mirror_error!("fatal: {}", error),
        _ => {}
    }
}

fn to_msg(event: PipelineEvent) -> Msg {
    match event {
        PipelineEvent::Status { stage } => Msg::PhaseChanged(match stage {
            PipelineStage::DeterminingLastPage => RunPhase::DeterminingLastPage,
            PipelineStage::Fetching => RunPhase::Fetching,
            PipelineStage::Complete => RunPhase::Complete,
        }),
        PipelineEvent::PageTotal { total } => Msg::PageTotal(total),
        PipelineEvent::LastPage { index } => Msg::LastPage(index),
        PipelineEvent::ExpectedTotal { count } => Msg::ExpectedTotal(count),
        PipelineEvent::ExistingEntries { count } => Msg::ExistingEntries(count),
        PipelineEvent::PageProgress { fetched, current } => Msg::PageProgress { fetched, current },
        PipelineEvent::PageQueue { stats } => Msg::PageQueue(snapshot(stats)),
        PipelineEvent::PageFailed { page, error } => Msg::PageFailed {
            page,
            message: error,
        },
        PipelineEvent::DownloadsScheduled { count } => Msg::DownloadsScheduled(count),
        PipelineEvent::DownloadQueue { stats } => Msg::DownloadQueue(snapshot(stats)),
        PipelineEvent::DownloadSucceeded { key } => Msg::DownloadSucceeded { key },
        PipelineEvent::DownloadFailed { key, error } => Msg::DownloadFailed {
            key,
            message: error,
        },
        PipelineEvent::Elapsed { seconds } => Msg::Elapsed { seconds },
        PipelineEvent::Fatal { error } => Msg::Fatal { message: error },
    }
}

fn snapshot(stats: QueueStats) -> QueueSnapshot {
    QueueSnapshot {
        active: stats.active,
        pending: stats.pending,
    }
}

fn summarize(view: &MirrorView) {
    if let Some(failure) = &view.failure {
        mirror_error!("run failed: {}", failure);
    }
    mirror_info!(
        "downloaded {} file(s), {} error(s), {} already present, {:.1}s elapsed",
        view.downloads_done(),
        view.error_count(),
        view.existing_count,
        view.elapsed_seconds
    );
}
