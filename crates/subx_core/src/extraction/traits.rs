//! Seams between the pipeline and the external tools.
//!
//! The coordinator and dispatcher only talk to these traits, so tests can
//! swap in fakes and deployments can swap tools without touching the
//! pipeline.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::types::{OcrProgress, OcrReport, ToolResult};
use crate::models::SubtitleTrack;

/// Lists the subtitle streams of a container.
#[async_trait]
pub trait TrackProber: Send + Sync {
    /// Probe `path` and return its subtitle tracks in container order.
    ///
    /// An empty list is a valid result.
    async fn probe(&self, path: &Path, cancel: &CancellationToken) -> ToolResult<Vec<SubtitleTrack>>;
}

/// Pulls a single subtitle stream out of a container.
#[async_trait]
pub trait SubtitleExtractor: Send + Sync {
    /// Copy a text stream to `dest`.
    async fn extract_text(
        &self,
        source: &Path,
        extract_id: usize,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> ToolResult<()>;

    /// Dump a bitmap stream to `dest` for OCR.
    async fn extract_image(
        &self,
        source: &Path,
        extract_id: usize,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> ToolResult<()>;
}

/// Callback receiving OCR progress updates.
pub type OcrProgressCallback = Arc<dyn Fn(&OcrProgress) + Send + Sync>;

/// One OCR job: bitmap stream in, text subtitle out.
#[derive(Clone)]
pub struct OcrRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Normalised ISO 639-2/B language code of the track.
    pub language: String,
    /// Apply text correction to the output as it is written.
    pub correct_on_write: bool,
    pub progress: Option<OcrProgressCallback>,
}

impl OcrRequest {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            language: language.into(),
            correct_on_write: false,
            progress: None,
        }
    }

    pub fn with_correction(mut self, correct: bool) -> Self {
        self.correct_on_write = correct;
        self
    }

    pub fn with_progress(mut self, progress: OcrProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl fmt::Debug for OcrRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrRequest")
            .field("input", &self.input)
            .field("output", &self.output)
            .field("language", &self.language)
            .field("correct_on_write", &self.correct_on_write)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Turns a bitmap subtitle stream into a text subtitle file.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, request: OcrRequest, cancel: &CancellationToken) -> ToolResult<OcrReport>;
}
