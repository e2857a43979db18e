//! Batch queue types and data structures.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::SourceLocation;

/// Status of an item in the batch queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QueueItemStatus {
    /// Waiting to be processed.
    #[default]
    Pending,
    /// Currently being processed.
    Processing,
    /// Subtitle written.
    Completed,
    /// Failed; see the status message.
    Error,
    /// Stopped by a cancel request.
    Cancelled,
}

impl QueueItemStatus {
    /// Get display string for UI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Completed => "Completed",
            Self::Error => "Error",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }

    /// Whether a run may move an item from `self` to `next`.
    pub fn can_transition_to(&self, next: QueueItemStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Error)
                | (Self::Processing, Self::Cancelled)
        )
    }
}

impl std::fmt::Display for QueueItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors from queue edits.
#[derive(Error, Debug)]
pub enum QueueError {
    /// The edit would touch an item that is being processed.
    #[error("Item at index {index} is being processed")]
    ItemBusy { index: usize },

    #[error("Index {index} out of range (queue has {len} items)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid status change {from} -> {to}")]
    InvalidTransition {
        from: QueueItemStatus,
        to: QueueItemStatus,
    },

    #[error("Queue I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Queue serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A single source file in the batch queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Unique item identifier.
    pub id: String,
    pub source_path: PathBuf,
    /// Display name (the source file name).
    pub display_name: String,
    pub size_bytes: u64,
    pub location: SourceLocation,
    pub estimated_time: Duration,
    pub status: QueueItemStatus,
    /// Error text, or manual-tool guidance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    pub added_at: DateTime<Utc>,
}

impl QueueItem {
    /// Create a new pending item.
    pub fn new(
        id: impl Into<String>,
        source_path: impl Into<PathBuf>,
        size_bytes: u64,
        location: SourceLocation,
        estimated_time: Duration,
    ) -> Self {
        let source_path = source_path.into();
        Self {
            id: id.into(),
            display_name: display_name_for(&source_path),
            source_path,
            size_bytes,
            location,
            estimated_time,
            status: QueueItemStatus::Pending,
            status_message: None,
            output_path: None,
            added_at: Utc::now(),
        }
    }

    /// Move to `next`, rejecting transitions a run may not make.
    pub fn transition(&mut self, next: QueueItemStatus) -> Result<(), QueueError> {
        if !self.status.can_transition_to(next) {
            return Err(QueueError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Back to Pending at the start of a run.
    pub(crate) fn reset(&mut self) {
        self.status = QueueItemStatus::Pending;
        self.status_message = None;
        self.output_path = None;
    }
}

fn display_name_for(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
