//! Core types for the batch coordinator.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::dispatch::ExtractionMethod;
use crate::jobs::{QueueItem, QueueItemStatus};
use crate::models::SubtitleTrack;

/// Progress callback type for reporting run progress.
///
/// Arguments: (item display name, percent complete, message)
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// State of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Handle for cancelling a running batch from another task.
///
/// Clones share the same token. The coordinator swaps in a fresh token
/// when a new run starts after a cancel, so existing handles keep working.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: Arc<Mutex<CancellationToken>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the run. Running tools are killed and the batch stops
    /// before the next item.
    pub fn cancel(&self) {
        self.token.lock().cancel();
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.lock().is_cancelled()
    }

    /// The current token, for passing into tool invocations.
    pub fn token(&self) -> CancellationToken {
        self.token.lock().clone()
    }

    /// Replace a cancelled token with a fresh one.
    pub(crate) fn renew(&self) {
        let mut token = self.token.lock();
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
    }
}

/// Cumulative statistics for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    /// Items the run was asked to process.
    pub total: usize,
    pub completed: usize,
    pub errors: usize,
    pub cancelled: usize,
    /// Errors caused by a track needing a manual tool (VobSub).
    pub manual_tool_required: usize,
    /// Errors caused by a container without subtitle tracks.
    pub no_track: usize,
    pub bytes_processed: u64,
    pub local_files: usize,
    pub network_files: usize,
    pub network_bytes: u64,
    pub ocr_items: usize,
    pub rules_triggered: usize,
    pub cleanup_failures: usize,
    pub estimated_time: Duration,
    pub elapsed: Duration,
}

impl RunStatistics {
    /// Account for an item the run picked up.
    pub(crate) fn record_started(&mut self, item: &QueueItem) {
        self.bytes_processed += item.size_bytes;
        self.estimated_time += item.estimated_time;
        if item.location.is_network() {
            self.network_files += 1;
            self.network_bytes += item.size_bytes;
        } else {
            self.local_files += 1;
        }
    }

    pub(crate) fn record_finished(&mut self, status: QueueItemStatus) {
        match status {
            QueueItemStatus::Completed => self.completed += 1,
            QueueItemStatus::Error => self.errors += 1,
            QueueItemStatus::Cancelled => self.cancelled += 1,
            QueueItemStatus::Pending | QueueItemStatus::Processing => {}
        }
    }

    /// Items that reached a final status.
    pub fn finished(&self) -> usize {
        self.completed + self.errors + self.cancelled
    }
}

/// Context of the run in progress, owned by the coordinator.
///
/// Everyone else gets `&ExtractionRun`.
#[derive(Debug, Clone, Default)]
pub struct ExtractionRun {
    run_id: String,
    state: RunState,
    busy: bool,
    current_source: Option<PathBuf>,
    current_tracks: Vec<SubtitleTrack>,
    selected_track: Option<SubtitleTrack>,
    last_processed_index: Option<usize>,
    stats: RunStatistics,
}

impl ExtractionRun {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn current_source(&self) -> Option<&PathBuf> {
        self.current_source.as_ref()
    }

    pub fn current_tracks(&self) -> &[SubtitleTrack] {
        &self.current_tracks
    }

    pub fn selected_track(&self) -> Option<&SubtitleTrack> {
        self.selected_track.as_ref()
    }

    /// Index of the last item that finished as Completed or Error.
    pub fn last_processed_index(&self) -> Option<usize> {
        self.last_processed_index
    }

    /// Where `resume_batch` picks up.
    pub fn resume_index(&self) -> usize {
        self.last_processed_index.map_or(0, |i| i + 1)
    }

    pub fn stats(&self) -> &RunStatistics {
        &self.stats
    }

    /// Start a run over the items from index `from`.
    pub(crate) fn begin(&mut self, run_id: String, from: usize, total: usize) {
        self.run_id = run_id;
        self.last_processed_index = from.checked_sub(1);
        self.state = RunState::Running;
        self.busy = true;
        self.stats = RunStatistics {
            total,
            ..RunStatistics::default()
        };
        self.clear_current();
    }

    pub(crate) fn finish(&mut self, state: RunState, elapsed: Duration) {
        self.state = state;
        self.busy = false;
        self.stats.elapsed = elapsed;
        self.clear_current();
    }

    pub(crate) fn point_at(&mut self, source: PathBuf) {
        self.current_source = Some(source);
        self.current_tracks.clear();
        self.selected_track = None;
    }

    pub(crate) fn set_tracks(&mut self, tracks: Vec<SubtitleTrack>) {
        self.current_tracks = tracks;
    }

    pub(crate) fn set_selected(&mut self, track: SubtitleTrack) {
        self.selected_track = Some(track);
    }

    pub(crate) fn mark_processed(&mut self, index: usize) {
        self.last_processed_index = Some(index);
    }

    pub(crate) fn stats_mut(&mut self) -> &mut RunStatistics {
        &mut self.stats
    }

    fn clear_current(&mut self) {
        self.current_source = None;
        self.current_tracks.clear();
        self.selected_track = None;
    }
}

/// Per-file line of a batch summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileResult {
    pub index: usize,
    pub item_id: String,
    pub display_name: String,
    pub source_path: PathBuf,
    pub status: QueueItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_id: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<ExtractionMethod>,
    pub elapsed: Duration,
}

/// Result of `process_batch`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub run_id: String,
    pub state: RunState,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub stats: RunStatistics,
    pub files: Vec<FileResult>,
    /// Index to pass to `process_batch` to continue after a cancel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_from: Option<usize>,
}

impl BatchSummary {
    /// Every processed item completed.
    pub fn all_completed(&self) -> bool {
        self.state == RunState::Completed && self.stats.completed == self.stats.total
    }
}
