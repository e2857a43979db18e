//! Batch coordinator: drives the queue through probe, select and dispatch.
//!
//! One item at a time. Each item is isolated: a failure marks that item
//! as Error and the loop moves on. Cancellation stops the loop before the
//! next item and leaves the remaining items Pending, so the run can be
//! resumed from [`ExtractionRun::resume_index`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use tokio_util::sync::CancellationToken;

use super::errors::PipelineError;
use super::types::{
    BatchSummary, CancelHandle, ExtractionRun, FileResult, ProgressCallback, RunState,
};
use crate::config::Settings;
use crate::dispatch::{remove_dir_with_retry, DispatchOutcome, DispatchRequest, Dispatcher, RetryPolicy};
use crate::extraction::{
    ExternalOcr, MkvextractExtractor, MkvmergeProber, OcrEngine, OcrProgress, OcrProgressCallback,
    SubtitleExtractor, TrackProber,
};
use crate::jobs::{QueueItem, QueueItemStatus, SharedQueue};
use crate::logging::{LogCallback, LogConfig, RunLogger};
use crate::output::OutputPlanner;
use crate::selection::{select_track, SelectionPreferences};

/// The three external collaborators.
#[derive(Clone)]
pub struct ToolSet {
    pub prober: Arc<dyn TrackProber>,
    pub extractor: Arc<dyn SubtitleExtractor>,
    pub ocr: Arc<dyn OcrEngine>,
}

impl ToolSet {
    pub fn new(
        prober: Arc<dyn TrackProber>,
        extractor: Arc<dyn SubtitleExtractor>,
        ocr: Arc<dyn OcrEngine>,
    ) -> Self {
        Self {
            prober,
            extractor,
            ocr,
        }
    }

    /// mkvmerge, mkvextract and the configured OCR program.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            prober: Arc::new(MkvmergeProber::from_settings(&settings.tools)),
            extractor: Arc::new(MkvextractExtractor::from_settings(&settings.tools)),
            ocr: Arc::new(ExternalOcr::from_settings(&settings.tools, &settings.correction)),
        }
    }
}

/// Result of one item before it is written back to the queue.
struct ItemResult {
    status: QueueItemStatus,
    message: Option<String>,
    output_path: Option<PathBuf>,
    track_id: Option<usize>,
    outcome: Option<DispatchOutcome>,
}

/// Runs the batch queue.
///
/// # Example
///
/// ```ignore
/// let queue = jobs::shared(BatchQueue::in_memory());
/// let mut coordinator = BatchCoordinator::new(settings.clone(), queue, ToolSet::from_settings(&settings));
/// let cancel = coordinator.cancel_handle();
/// let summary = coordinator.process_batch(0).await?;
/// ```
pub struct BatchCoordinator {
    /// Settings snapshot for the coordinator's lifetime.
    settings: Settings,
    queue: SharedQueue,
    prober: Arc<dyn TrackProber>,
    dispatcher: Dispatcher,
    preferences: SelectionPreferences,
    planner: OutputPlanner,
    retry: RetryPolicy,
    temp_root: PathBuf,
    log_dir: Option<PathBuf>,
    log_callback: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    progress: Option<Arc<dyn Fn(&str, u32, &str) + Send + Sync>>,
    cancel: CancelHandle,
    run: ExtractionRun,
    runs_started: u64,
}

impl BatchCoordinator {
    pub fn new(settings: Settings, queue: SharedQueue, tools: ToolSet) -> Self {
        let dispatcher = Dispatcher::from_settings(&settings, tools.extractor, tools.ocr);
        Self {
            preferences: SelectionPreferences::from_settings(&settings.extraction),
            planner: OutputPlanner::from_settings(&settings.paths, &settings.extraction),
            retry: RetryPolicy::from_settings(&settings.cleanup),
            temp_root: PathBuf::from(&settings.paths.temp_root),
            prober: tools.prober,
            dispatcher,
            settings,
            queue,
            log_dir: None,
            log_callback: None,
            progress: None,
            cancel: CancelHandle::new(),
            run: ExtractionRun::default(),
            runs_started: 0,
        }
    }

    /// Write a log file per run into `dir`.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Receive every run log line.
    pub fn with_log_callback(mut self, callback: Arc<dyn Fn(&str) + Send + Sync>) -> Self {
        self.log_callback = Some(callback);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(Arc::from(callback));
        self
    }

    /// Override the selection preferences from the settings.
    pub fn with_preferences(mut self, preferences: SelectionPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// Replace the dispatcher built from the settings.
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Read-only view of the current run.
    pub fn run(&self) -> &ExtractionRun {
        &self.run
    }

    pub fn queue(&self) -> &SharedQueue {
        &self.queue
    }

    /// Continue after the last item that finished.
    pub async fn resume_batch(&mut self) -> Result<BatchSummary, PipelineError> {
        let from = self.run.resume_index();
        self.process_batch(from).await
    }

    /// Process queue items from index `from` to the end.
    ///
    /// Items at `from` and after are reset to Pending first. Per-item
    /// failures are recorded on the item; only queue-level problems
    /// return an error.
    pub async fn process_batch(&mut self, from: usize) -> Result<BatchSummary, PipelineError> {
        self.cancel.renew();
        let token = self.cancel.token();
        let started_at = Local::now();
        let clock = Instant::now();

        let len = self.queue.lock().len();
        self.runs_started += 1;
        let run_id = format!("run-{}-{}", started_at.format("%Y%m%d-%H%M%S"), self.runs_started);

        if from > len {
            self.run.begin(run_id, len, 0);
            self.run.finish(RunState::Failed, clock.elapsed());
            return Err(PipelineError::InvalidStartIndex { index: from, len });
        }

        // Items are followed by id so queue edits during the run cannot
        // shift the loop onto the wrong entry.
        let pending: Vec<String> = {
            let mut queue = self.queue.lock();
            queue.reset_from(from);
            queue.items()[from..].iter().map(|item| item.id.clone()).collect()
        };
        let total = pending.len();
        self.run.begin(run_id.clone(), from, total);
        self.planner.reset();

        let logger = self.create_logger(&run_id);
        logger.section(&format!("Batch {} ({} items from index {})", run_id, total, from));

        let run_dir = self.temp_root.join(&run_id);
        let mut files = Vec::new();
        let mut state = RunState::Completed;

        for item_id in &pending {
            tokio::task::yield_now().await;

            if token.is_cancelled() {
                logger.warn("Cancelled before next item");
                state = RunState::Cancelled;
                break;
            }

            let (index, item) = match self.start_item(item_id) {
                Ok(Some(started)) => started,
                Ok(None) => {
                    logger.warn(&format!("{} left the queue before it was reached", item_id));
                    self.run.stats_mut().total -= 1;
                    continue;
                }
                Err(e) => {
                    logger.error(&e.to_string());
                    self.run.finish(RunState::Failed, clock.elapsed());
                    logger.close();
                    return Err(e);
                }
            };
            let total = self.run.stats().total;

            logger.begin_item();
            logger.phase(&format!("[{}/{}] {}", files.len() + 1, total, item.display_name));
            self.report_progress(&item.display_name, files.len(), total, "processing");

            let item_clock = Instant::now();
            let work_dir = run_dir.join(&item.id);
            let result = match self.process_item(&item, &work_dir, &token, &logger).await {
                Ok((track_id, outcome)) => self.outcome_to_result(track_id, outcome),
                Err(e) => self.error_to_result(e),
            };

            self.cleanup_work_dir(&work_dir, &logger).await;

            match result.status {
                QueueItemStatus::Completed => logger.success(&format!(
                    "{} -> {}",
                    item.display_name,
                    result
                        .output_path
                        .as_deref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default()
                )),
                QueueItemStatus::Cancelled => logger.warn(&format!("{}: cancelled", item.display_name)),
                _ => {
                    logger.error(&format!(
                        "{}: {}",
                        item.display_name,
                        result.message.as_deref().unwrap_or("failed")
                    ));
                    logger.dump_recent("ocr");
                }
            }

            if let Err(e) = self.finish_item(&item, index, &result) {
                logger.error(&e.to_string());
                self.run.finish(RunState::Failed, clock.elapsed());
                logger.close();
                return Err(e);
            }

            let method = match &result.outcome {
                Some(DispatchOutcome::Extracted { method, .. }) => Some(*method),
                _ => None,
            };
            files.push(FileResult {
                index,
                item_id: item.id.clone(),
                display_name: item.display_name.clone(),
                source_path: item.source_path.clone(),
                status: result.status,
                message: result.message.clone(),
                output_path: result.output_path.clone(),
                track_id: result.track_id,
                method,
                elapsed: item_clock.elapsed(),
            });

            self.report_progress(&item.display_name, files.len(), total, result.status.as_str());

            if result.status == QueueItemStatus::Cancelled {
                state = RunState::Cancelled;
                break;
            }
        }

        if !self.settings.extraction.preserve_intermediate_files && run_dir.exists() {
            if let Err(e) = remove_dir_with_retry(&run_dir, &self.retry).await {
                logger.warn(&format!("Could not remove {}: {}", run_dir.display(), e.source));
                self.run.stats_mut().cleanup_failures += 1;
            }
        }

        self.run.finish(state, clock.elapsed());
        if let Err(e) = self.queue.lock().save() {
            logger.warn(&format!("Could not save queue: {}", e));
        }

        let stats = self.run.stats().clone();
        logger.section(&format!(
            "{}: {} completed, {} errors, {} cancelled in {:.1}s (estimated {:.1}s)",
            state,
            stats.completed,
            stats.errors,
            stats.cancelled,
            stats.elapsed.as_secs_f64(),
            stats.estimated_time.as_secs_f64()
        ));
        logger.close();

        let resume_from = (state == RunState::Cancelled).then(|| self.run.resume_index());
        Ok(BatchSummary {
            run_id,
            state,
            started_at,
            finished_at: Local::now(),
            stats,
            files,
            resume_from,
        })
    }

    /// Mark the item with `id` Processing and point the run at it.
    ///
    /// `None` when the item was removed from the queue since the run began.
    fn start_item(&mut self, id: &str) -> Result<Option<(usize, QueueItem)>, PipelineError> {
        let (index, item) = {
            let mut queue = self.queue.lock();
            let Some(index) = queue.index_of(id) else {
                return Ok(None);
            };
            let item = queue
                .get_mut(index)
                .ok_or(PipelineError::QueueUnavailable { index })?;
            item.transition(QueueItemStatus::Processing)
                .map_err(|_| PipelineError::QueueUnavailable { index })?;
            (index, item.clone())
        };

        self.run.stats_mut().record_started(&item);
        self.run.point_at(item.source_path.clone());
        Ok(Some((index, item)))
    }

    /// Write the result back to the queue item, found by id.
    fn finish_item(&mut self, item: &QueueItem, index: usize, result: &ItemResult) -> Result<(), PipelineError> {
        {
            let mut queue = self.queue.lock();
            let current = queue
                .index_of(&item.id)
                .and_then(|i| queue.get_mut(i))
                .ok_or(PipelineError::QueueUnavailable { index })?;
            current
                .transition(result.status)
                .map_err(|_| PipelineError::QueueUnavailable { index })?;
            current.status_message = result.message.clone();
            current.output_path = result.output_path.clone();
        }

        let stats = self.run.stats_mut();
        stats.record_finished(result.status);
        match &result.outcome {
            Some(DispatchOutcome::Extracted {
                rules_triggered,
                ocr_units,
                cleanup,
                ..
            }) => {
                stats.rules_triggered += rules_triggered;
                if ocr_units.is_some() {
                    stats.ocr_items += 1;
                }
                if cleanup.is_failed() {
                    stats.cleanup_failures += 1;
                }
            }
            Some(DispatchOutcome::ManualToolRequired { .. }) => stats.manual_tool_required += 1,
            None => {}
        }

        if result.status != QueueItemStatus::Cancelled {
            self.run.mark_processed(index);
        }
        Ok(())
    }

    async fn process_item(
        &mut self,
        item: &QueueItem,
        work_dir: &Path,
        token: &CancellationToken,
        logger: &RunLogger,
    ) -> Result<(usize, DispatchOutcome), PipelineError> {
        if token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let source = item.source_path.as_path();
        logger.command(&format!("probe {}", source.display()));
        let tracks = self
            .prober
            .probe(source, token)
            .await
            .map_err(|e| PipelineError::probe(source, e))?;
        logger.info(&format!("{} subtitle track(s)", tracks.len()));
        self.run.set_tracks(tracks);

        let track = select_track(self.run.current_tracks(), &self.preferences)
            .cloned()
            .ok_or_else(|| PipelineError::NoSuitableTrack {
                path: source.to_path_buf(),
            })?;
        logger.info(&format!(
            "Selected track {}: {} {} ({})",
            track.id(),
            track.codec().name(),
            track.language(),
            track.kind()
        ));
        self.run.set_selected(track.clone());

        let output_path = self.planner.assign(source, &track);
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::io("create output directory", e))?;
        }

        let progress = self.ocr_progress(&item.display_name, logger);
        let outcome = self
            .dispatcher
            .dispatch(
                DispatchRequest {
                    source,
                    track: &track,
                    output_path: &output_path,
                    work_dir,
                    progress: Some(progress),
                },
                token,
            )
            .await?;

        Ok((track.id(), outcome))
    }

    fn outcome_to_result(&self, track_id: usize, outcome: DispatchOutcome) -> ItemResult {
        match &outcome {
            DispatchOutcome::Extracted { output_path, .. } => ItemResult {
                status: QueueItemStatus::Completed,
                message: None,
                output_path: Some(output_path.clone()),
                track_id: Some(track_id),
                outcome: Some(outcome),
            },
            DispatchOutcome::ManualToolRequired { guidance, .. } => ItemResult {
                status: QueueItemStatus::Error,
                message: Some(guidance.clone()),
                output_path: None,
                track_id: Some(track_id),
                outcome: Some(outcome),
            },
        }
    }

    fn error_to_result(&mut self, error: PipelineError) -> ItemResult {
        let status = if error.is_cancelled() {
            QueueItemStatus::Cancelled
        } else {
            QueueItemStatus::Error
        };
        if matches!(error, PipelineError::NoSuitableTrack { .. }) {
            self.run.stats_mut().no_track += 1;
        }
        ItemResult {
            status,
            message: Some(error.to_string()),
            output_path: None,
            track_id: self.run.selected_track().map(|t| t.id()),
            outcome: None,
        }
    }

    async fn cleanup_work_dir(&mut self, work_dir: &Path, logger: &RunLogger) {
        if self.settings.extraction.preserve_intermediate_files || !work_dir.exists() {
            return;
        }
        if let Err(e) = remove_dir_with_retry(work_dir, &self.retry).await {
            let err = PipelineError::CleanupFailed {
                path: work_dir.to_path_buf(),
                message: e.source.to_string(),
            };
            logger.warn(&err.to_string());
            self.run.stats_mut().cleanup_failures += 1;
        }
    }

    fn create_logger(&self, run_id: &str) -> RunLogger {
        let config = LogConfig::from_settings(&self.settings.logging);

        if let Some(dir) = self.log_dir.as_ref().filter(|_| self.settings.logging.write_run_log) {
            match RunLogger::new(run_id, dir, config.clone(), self.log_sink()) {
                Ok(logger) => return logger,
                Err(e) => tracing::warn!("Cannot create run log in {}: {}", dir.display(), e),
            }
        }
        RunLogger::detached(run_id, config, self.log_sink())
    }

    fn log_sink(&self) -> Option<LogCallback> {
        let callback = self.log_callback.clone()?;
        Some(Box::new(move |line: &str| callback(line)))
    }

    /// OCR updates go into the run log and, when set, the progress
    /// callback.
    fn ocr_progress(&self, display_name: &str, logger: &RunLogger) -> OcrProgressCallback {
        let logger = logger.clone();
        let progress = self.progress.clone();
        let name = display_name.to_string();
        Arc::new(move |update: &OcrProgress| {
            let phase = update.phase.as_deref().unwrap_or("ocr");
            logger.tool_output(&format!("[{}] {}/{}", phase, update.processed, update.total));
            logger.progress(update.percent());
            if let Some(progress) = &progress {
                progress(&name, update.percent(), phase);
            }
        })
    }

    fn report_progress(&self, name: &str, done: usize, total: usize, message: &str) {
        if let Some(progress) = &self.progress {
            let percent = if total == 0 { 100 } else { (done * 100 / total) as u32 };
            progress(name, percent, message);
        }
    }
}
