//! Error types for the extraction pipeline.
//!
//! Tool failures are wrapped with the pipeline stage that hit them:
//! Item → Stage → Tool → Detail

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::extraction::ToolError;

/// Failure of one item (or of the whole run, for the queue variants).
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The prober could not read the container.
    #[error("Probe failed for {}: {source}", .path.display())]
    ProbeFailed {
        path: PathBuf,
        #[source]
        source: ToolError,
    },

    /// The container has no subtitle track to extract.
    #[error("No suitable track in {}", .path.display())]
    NoSuitableTrack { path: PathBuf },

    /// The selected track's codec has no extraction strategy.
    #[error("Unsupported subtitle codec '{codec}'")]
    UnsupportedCodec { codec: String },

    /// The extractor failed.
    #[error("Extraction of track {track_id} failed: {source}")]
    ExtractionFailed {
        track_id: usize,
        #[source]
        source: ToolError,
    },

    /// The OCR engine failed.
    #[error("OCR of track {track_id} failed: {source}")]
    OcrFailed {
        track_id: usize,
        #[source]
        source: ToolError,
    },

    /// An intermediate file could not be deleted. Logged, never fatal.
    #[error("Cleanup failed for {}: {message}", .path.display())]
    CleanupFailed { path: PathBuf, message: String },

    /// The run was cancelled.
    #[error("Cancelled")]
    Cancelled,

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// The queue changed under the running batch.
    #[error("Queue item at index {index} is no longer available")]
    QueueUnavailable { index: usize },

    /// `process_batch` was asked to start past the end of the queue.
    #[error("Start index {index} is beyond the queue length {len}")]
    InvalidStartIndex { index: usize, len: usize },
}

impl PipelineError {
    /// Whether this is a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Wrap a prober error. Cancellation stays cancellation.
    pub fn probe(path: impl Into<PathBuf>, source: ToolError) -> Self {
        if source.is_cancelled() {
            return Self::Cancelled;
        }
        Self::ProbeFailed {
            path: path.into(),
            source,
        }
    }

    /// Wrap an extractor error.
    pub fn extraction(track_id: usize, source: ToolError) -> Self {
        if source.is_cancelled() {
            return Self::Cancelled;
        }
        Self::ExtractionFailed { track_id, source }
    }

    /// Wrap an OCR error.
    pub fn ocr(track_id: usize, source: ToolError) -> Self {
        if source.is_cancelled() {
            return Self::Cancelled;
        }
        Self::OcrFailed { track_id, source }
    }
}
