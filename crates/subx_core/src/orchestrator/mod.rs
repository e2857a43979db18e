//! Batch and single-file orchestration.
//!
//! ```text
//! BatchCoordinator
//!     for each queue item (from a start index):
//!         probe ──► select ──► plan output ──► dispatch
//!                                                 ├── text copy (+ correction)
//!                                                 ├── dump ──► OCR (+ correction) ──► cleanup
//!                                                 └── manual tool required
//! ```
//!
//! # Example
//!
//! ```ignore
//! use subx_core::orchestrator::{BatchCoordinator, ToolSet};
//!
//! let mut coordinator = BatchCoordinator::new(settings.clone(), queue, ToolSet::from_settings(&settings));
//! let cancel = coordinator.cancel_handle();
//! let summary = coordinator.process_batch(0).await?;
//! if let Some(next) = summary.resume_from {
//!     println!("Cancelled; resume from {}", next);
//! }
//! ```

mod coordinator;
mod errors;
mod single;
mod types;

pub use coordinator::{BatchCoordinator, ToolSet};
pub use errors::PipelineError;
pub use single::{SingleFileExtractor, SingleFileOutcome};
pub use types::{
    BatchSummary, CancelHandle, ExtractionRun, FileResult, ProgressCallback, RunState,
    RunStatistics,
};
