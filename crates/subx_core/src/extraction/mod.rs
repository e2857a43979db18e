//! External tool adapters.
//!
//! Everything that spawns a process lives here:
//!
//! - **Probe**: list subtitle tracks with `mkvmerge -J`
//! - **Extract**: copy a stream out with `mkvextract tracks`
//! - **OCR**: run a configurable OCR program on a bitmap stream
//!
//! All invocations go through [`ToolCommand`], which races the child
//! against a cancellation token and a timeout and kills it on either.
//!
//! The pipeline only sees the [`TrackProber`], [`SubtitleExtractor`] and
//! [`OcrEngine`] traits.
//!
//! # Usage
//!
//! ```ignore
//! use subx_core::extraction::{MkvmergeProber, TrackProber};
//! use tokio_util::sync::CancellationToken;
//!
//! let prober = MkvmergeProber::new("mkvmerge");
//! let tracks = prober.probe(Path::new("/media/show.mkv"), &CancellationToken::new()).await?;
//! ```

mod mkvextract;
mod ocr;
mod probe;
mod runner;
mod tools;
mod traits;
mod types;

pub use mkvextract::MkvextractExtractor;
pub use ocr::{parse_progress_line, ExternalOcr};
pub use probe::{parse_subtitle_tracks, MkvmergeProber};
pub use runner::{ToolCommand, ToolOutput};
pub use tools::{check_tools, locate_tool, missing_tools, ToolStatus};
pub use traits::{OcrEngine, OcrProgressCallback, OcrRequest, SubtitleExtractor, TrackProber};
pub use types::{OcrProgress, OcrReport, ToolError, ToolResult};

pub(crate) use types::ensure_exists;
