use std::collections::HashSet;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::error::DownloadError;
use crate::core::events::{LogLevel, UiEvent, UiSender};
use crate::core::model::{BatchRun, BatchState, DownloadOutcome, DownloadRequest, VideoMetadata};
use crate::core::naming::{file_stem, unique_filename};
use crate::core::progress::{ProgressBridge, ProgressMode};
use crate::core::store::HistoryStore;
use crate::i18n::Messages;
use crate::plugins::http::thumbnail::ThumbnailFetcher;
use crate::plugins::registry::StrategyFactory;
use crate::plugins::ytdlp::resolver::MetadataResolver;

const UNKNOWN_TITLE: &str = "Unknown";

/// A request whose metadata is known and whose output name is reserved.
struct PreparedItem {
    meta: VideoMetadata,
    filename: String,
    output_path: PathBuf,
}

/// Runs downloads on the background task: one at a time, each isolated from
/// the failures of the others.
pub struct Orchestrator {
    factory: StrategyFactory,
    resolver: MetadataResolver,
    thumbnails: Option<ThumbnailFetcher>,
    history: HistoryStore,
    ui: UiSender,
    messages: &'static Messages,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        factory: StrategyFactory,
        history: HistoryStore,
        ui: UiSender,
        messages: &'static Messages,
    ) -> Self {
        let ctx = factory.context().clone();
        let thumbnails = match ThumbnailFetcher::new(&ctx.user_agent) {
            Ok(f) => Some(f),
            Err(e) => {
                warn!(error = %e, "thumbnail client unavailable");
                None
            }
        };
        let resolver = MetadataResolver::new(factory.engine(), ctx.clone(), ui.clone(), messages);
        Self {
            factory,
            resolver,
            thumbnails,
            history,
            ui,
            messages,
            cancel: ctx.cancel,
        }
    }

    /// One download; a failure is returned to the caller instead of recorded.
    pub async fn run_single(&self, request: DownloadRequest) -> Result<DownloadOutcome, DownloadError> {
        let mode = ProgressMode::Single;
        let item = self.prepare_item(&request, mode, &HashSet::new()).await;
        match self.download_item(&request, &item, mode).await {
            Ok(()) => {
                self.ui.log(
                    LogLevel::Success,
                    format!("{}: {}", self.messages.download_complete, item.output_path.display()),
                );
                self.ui.post(UiEvent::SingleFinished { path: item.output_path.clone() });
                Ok(DownloadOutcome::success(request, &item.output_path))
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "download failed");
                Err(e)
            }
        }
    }

    /// Processes `requests` in order. Every started item yields exactly one
    /// outcome; a stop leaves the remaining items untouched.
    pub async fn run_batch(&self, requests: Vec<DownloadRequest>) -> BatchRun {
        let total = requests.len();
        let mut run = BatchRun::new(total);
        self.transition(&mut run, BatchState::Running);
        info!(batch_id = %run.id, total, "batch started");
        self.ui.log(LogLevel::Info, format!("{} {}: {}", self.messages.batch, self.messages.started, total));

        let mut assigned = HashSet::new();
        for (idx, request) in requests.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(batch_id = %run.id, remaining = total - idx, "batch stopped");
                self.ui.log(LogLevel::Warning, self.messages.stopped);
                break;
            }
            let mode = ProgressMode::Batch { ordinal: idx + 1, total };

            self.transition(&mut run, BatchState::ItemResolving);
            let item = self.prepare_item(&request, mode, &assigned).await;

            self.transition(&mut run, BatchState::ItemDownloading);
            let outcome = match self.download_item(&request, &item, mode).await {
                Ok(()) => {
                    // only names with a file behind them block later items
                    assigned.insert(item.filename.clone());
                    self.ui.log(
                        LogLevel::Success,
                        format!("{}{}: {}", mode.prefix(), self.messages.download_complete, item.filename),
                    );
                    DownloadOutcome::success(request, &item.output_path)
                }
                Err(e) => {
                    warn!(batch_id = %run.id, url = %request.url, error = %e, "batch item failed");
                    self.ui.log(
                        LogLevel::Error,
                        format!("{}{}: {}", mode.prefix(), self.messages.download_failed, e),
                    );
                    DownloadOutcome::failure(request, e.to_string())
                }
            };
            run.record(outcome);
            self.transition(&mut run, BatchState::ItemDone);
        }

        self.transition(&mut run, BatchState::Finished);
        self.report(&run);
        run
    }

    fn transition(&self, run: &mut BatchRun, state: BatchState) {
        run.state = state;
        debug!(batch_id = %run.id, ?state, "batch state");
        self.ui.post(UiEvent::StateChanged { batch_id: run.id, state });
    }

    fn report(&self, run: &BatchRun) {
        let m = self.messages;
        let failed = run.failed_count();
        info!(
            batch_id = %run.id,
            completed = run.completed_count,
            total = run.total_count,
            failed,
            not_started = run.not_started_count(),
            "batch finished"
        );
        if run.is_full_success() {
            self.ui.log(
                LogLevel::Success,
                format!("{} ({}/{})", m.batch_all_done, run.completed_count, run.total_count),
            );
        } else {
            let mut line = format!(
                "{}: {} {}/{}, {} {}",
                m.batch_partial, m.succeeded, run.completed_count, run.total_count, m.failed, failed
            );
            if run.not_started_count() > 0 {
                line.push_str(&format!(", {} {}", m.not_started, run.not_started_count()));
            }
            self.ui.log(LogLevel::Warning, line);
        }
        self.ui.post(UiEvent::BatchFinished {
            batch_id: run.id,
            completed: run.completed_count,
            total: run.total_count,
            failed,
        });
    }

    async fn prepare_item(
        &self,
        request: &DownloadRequest,
        mode: ProgressMode,
        assigned: &HashSet<String>,
    ) -> PreparedItem {
        let prefix = mode.prefix();
        self.ui.log(LogLevel::Info, format!("{prefix}{}", self.messages.fetching_info));

        let meta = self.resolver.resolve(&request.url, request.format).await;
        let filename = unique_filename(&request.destination_dir, &meta.filename, assigned);
        let output_path = request.destination_dir.join(&filename);

        self.ui.post(UiEvent::VideoInfo {
            title_line: format!("{prefix}{}", title_line(&meta)),
            channel_line: format!("@{}", meta.uploader),
        });
        self.ui.log(LogLevel::Info, format!("{prefix}{}: {filename}", self.messages.file_name));

        PreparedItem { meta, filename, output_path }
    }

    async fn download_item(
        &self,
        request: &DownloadRequest,
        item: &PreparedItem,
        mode: ProgressMode,
    ) -> Result<(), DownloadError> {
        if request.fetch_thumbnail {
            self.fetch_thumbnail(request, item).await;
        }

        let callback = ProgressBridge::new(self.ui.clone(), mode, self.messages).into_callback();
        let strategy = self.factory.strategy_for(request.format, Some(callback));
        debug!(strategy = strategy.name(), path = %item.output_path.display(), "downloading");
        strategy.download(&request.url, &item.output_path).await?;

        self.record_history(request, item).await;
        Ok(())
    }

    async fn fetch_thumbnail(&self, request: &DownloadRequest, item: &PreparedItem) {
        let Some(fetcher) = &self.thumbnails else {
            self.ui.log(LogLevel::Warning, self.messages.thumbnail_failed);
            return;
        };
        let stem = file_stem(&item.filename);
        match fetcher
            .fetch(item.meta.thumbnail_url.as_deref(), &request.destination_dir, stem)
            .await
        {
            Ok(path) => self.ui.log(
                LogLevel::Success,
                format!("{}: {}", self.messages.thumbnail_saved, path.display()),
            ),
            Err(e) => {
                warn!(url = %request.url, error = %e, "thumbnail not saved");
                self.ui.log(LogLevel::Warning, format!("{}: {}", self.messages.thumbnail_failed, e));
            }
        }
    }

    /// A history write failure never fails the download it describes.
    async fn record_history(&self, request: &DownloadRequest, item: &PreparedItem) {
        let title = if item.meta.title.is_empty() { UNKNOWN_TITLE } else { item.meta.title.as_str() };
        if let Err(e) = self
            .history
            .add_record(title, request.format.id(), &item.output_path, &request.url)
            .await
        {
            warn!(error = %e, "history not updated");
            self.ui.log(LogLevel::Warning, format!("{}: {}", self.messages.history_failed, e));
        }
    }
}

fn title_line(meta: &VideoMetadata) -> String {
    if meta.height > 0 {
        format!("{}p_{}", meta.height, meta.title)
    } else {
        meta.title.clone()
    }
}
