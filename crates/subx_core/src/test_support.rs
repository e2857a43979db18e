//! In-memory stand-ins for the external tools, shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::correction::{correct_file, CorrectionEngine};
use crate::extraction::{
    OcrEngine, OcrProgress, OcrReport, OcrRequest, SubtitleExtractor, ToolError, ToolResult, TrackProber,
};
use crate::models::{CorrectionLevel, SubtitleTrack};

type ProbeHook = Box<dyn FnOnce() + Send>;

/// Prober answering from a fixed table. Unknown paths fail.
#[derive(Default)]
pub struct FakeProber {
    tracks: HashMap<PathBuf, Vec<SubtitleTrack>>,
    /// Cancel this token when the given path is probed.
    cancel_on: Mutex<Option<(PathBuf, CancellationToken)>>,
    /// Run once, the first time the path is probed.
    hooks: Mutex<Vec<(PathBuf, ProbeHook)>>,
    probed: Mutex<Vec<PathBuf>>,
}

impl FakeProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracks(mut self, path: impl Into<PathBuf>, tracks: Vec<SubtitleTrack>) -> Self {
        self.tracks.insert(path.into(), tracks);
        self
    }

    pub fn cancel_when_probing(&self, path: impl Into<PathBuf>, token: CancellationToken) {
        *self.cancel_on.lock() = Some((path.into(), token));
    }

    pub fn run_when_probing(&self, path: impl Into<PathBuf>, hook: impl FnOnce() + Send + 'static) {
        self.hooks.lock().push((path.into(), Box::new(hook)));
    }

    pub fn probed(&self) -> Vec<PathBuf> {
        self.probed.lock().clone()
    }
}

#[async_trait]
impl TrackProber for FakeProber {
    async fn probe(&self, path: &Path, cancel: &CancellationToken) -> ToolResult<Vec<SubtitleTrack>> {
        if cancel.is_cancelled() {
            return Err(ToolError::cancelled("fake-prober"));
        }
        self.probed.lock().push(path.to_path_buf());

        if let Some((target, token)) = self.cancel_on.lock().as_ref() {
            if target == path {
                token.cancel();
            }
        }
        let due: Vec<ProbeHook> = {
            let mut hooks = self.hooks.lock();
            let (due, rest): (Vec<_>, Vec<_>) = hooks.drain(..).partition(|(target, _)| target == path);
            *hooks = rest;
            due.into_iter().map(|(_, hook)| hook).collect()
        };
        for hook in due {
            hook();
        }

        self.tracks
            .get(path)
            .cloned()
            .ok_or_else(|| ToolError::command_failed("fake-prober", 2, "unreadable container"))
    }
}

/// Extractor writing canned content. Text streams get `text`, image
/// streams get a few bytes of fake bitmap data.
pub struct FakeExtractor {
    text: String,
    failing_sources: HashSet<PathBuf>,
    /// Sources whose extraction writes half the output, then fails.
    truncating_sources: HashSet<PathBuf>,
    text_calls: Mutex<usize>,
    image_calls: Mutex<usize>,
}

impl FakeExtractor {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            failing_sources: HashSet::new(),
            truncating_sources: HashSet::new(),
            text_calls: Mutex::new(0),
            image_calls: Mutex::new(0),
        }
    }

    pub fn failing_for(mut self, source: impl Into<PathBuf>) -> Self {
        self.failing_sources.insert(source.into());
        self
    }

    pub fn truncating_for(mut self, source: impl Into<PathBuf>) -> Self {
        self.truncating_sources.insert(source.into());
        self
    }

    pub fn text_calls(&self) -> usize {
        *self.text_calls.lock()
    }

    pub fn image_calls(&self) -> usize {
        *self.image_calls.lock()
    }

    fn write(&self, source: &Path, dest: &Path, bytes: &[u8], cancel: &CancellationToken) -> ToolResult<()> {
        if cancel.is_cancelled() {
            return Err(ToolError::cancelled("fake-extractor"));
        }
        if self.failing_sources.contains(source) {
            return Err(ToolError::command_failed("fake-extractor", 2, "corrupt stream"));
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if self.truncating_sources.contains(source) {
            std::fs::write(dest, &bytes[..bytes.len() / 2])?;
            return Err(ToolError::command_failed("fake-extractor", 2, "write interrupted"));
        }
        std::fs::write(dest, bytes)?;
        Ok(())
    }
}

#[async_trait]
impl SubtitleExtractor for FakeExtractor {
    async fn extract_text(
        &self,
        source: &Path,
        _extract_id: usize,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> ToolResult<()> {
        *self.text_calls.lock() += 1;
        self.write(source, dest, self.text.as_bytes(), cancel)
    }

    async fn extract_image(
        &self,
        source: &Path,
        _extract_id: usize,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> ToolResult<()> {
        *self.image_calls.lock() += 1;
        self.write(source, dest, b"PG\x00\x01", cancel)
    }
}

#[derive(Default)]
struct OcrLog {
    inputs: Vec<PathBuf>,
    corrections: Vec<bool>,
    input_existed: Vec<bool>,
}

/// OCR engine that writes `text` and applies standard correction when
/// asked to, like the real adapter does. Reports two progress updates.
pub struct FakeOcr {
    text: String,
    fail: bool,
    log: Mutex<OcrLog>,
}

impl FakeOcr {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            fail: false,
            log: Mutex::new(OcrLog::default()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    pub fn calls(&self) -> usize {
        self.log.lock().inputs.len()
    }

    pub fn inputs(&self) -> Vec<PathBuf> {
        self.log.lock().inputs.clone()
    }

    pub fn corrections_requested(&self) -> Vec<bool> {
        self.log.lock().corrections.clone()
    }

    /// Every OCR call found its bitmap input on disk.
    pub fn saw_existing_input(&self) -> bool {
        let log = self.log.lock();
        !log.input_existed.is_empty() && log.input_existed.iter().all(|e| *e)
    }
}

#[async_trait]
impl OcrEngine for FakeOcr {
    async fn recognize(&self, request: OcrRequest, cancel: &CancellationToken) -> ToolResult<OcrReport> {
        {
            let mut log = self.log.lock();
            log.inputs.push(request.input.clone());
            log.corrections.push(request.correct_on_write);
            log.input_existed.push(request.input.exists());
        }

        if cancel.is_cancelled() {
            return Err(ToolError::cancelled("fake-ocr"));
        }
        if self.fail {
            return Err(ToolError::command_failed("fake-ocr", 1, "recognition failed"));
        }

        if let Some(progress) = &request.progress {
            for processed in [1, 2] {
                progress(&OcrProgress {
                    processed,
                    total: 2,
                    phase: Some("ocr".to_string()),
                });
            }
        }
        std::fs::write(&request.output, &self.text)?;

        let mut report = OcrReport {
            units: Some(1),
            rules_triggered: 0,
        };
        if request.correct_on_write {
            let engine = CorrectionEngine::new(CorrectionLevel::Standard);
            report.rules_triggered = correct_file(&request.output, &engine, false)
                .map(|r| r.rules_triggered)
                .unwrap_or(0);
        }
        Ok(report)
    }
}
