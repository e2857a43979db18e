//! Batch queue management.
//!
//! This module provides:
//! - `BatchQueue`: ordered list of source files with optional persistence
//!   to `queue.json` in the temp folder
//! - `QueueItem`: one source file with status, estimate and result
//! - `SharedQueue`: the queue as shared between a front end and the
//!   coordinator

mod queue;
mod types;

use std::sync::Arc;

use parking_lot::Mutex;

pub use queue::BatchQueue;
pub use types::{QueueError, QueueItem, QueueItemStatus};

/// Queue handle shared with the coordinator. Never hold the guard
/// across an `.await`.
pub type SharedQueue = Arc<Mutex<BatchQueue>>;

/// Wrap a queue for sharing.
pub fn shared(queue: BatchQueue) -> SharedQueue {
    Arc::new(Mutex::new(queue))
}
