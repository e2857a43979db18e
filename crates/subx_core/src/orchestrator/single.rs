//! One file, no queue.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::coordinator::ToolSet;
use super::errors::PipelineError;
use crate::config::Settings;
use crate::dispatch::{remove_dir_with_retry, DispatchOutcome, DispatchRequest, Dispatcher, RetryPolicy};
use crate::extraction::{OcrProgressCallback, TrackProber};
use crate::models::SubtitleTrack;
use crate::output::OutputPlanner;
use crate::selection::{select_track, SelectionPreferences};

/// What happened to a single file.
#[derive(Debug, Clone, Serialize)]
pub struct SingleFileOutcome {
    pub source: PathBuf,
    /// Every subtitle track the container reported.
    pub tracks: Vec<SubtitleTrack>,
    pub selected: SubtitleTrack,
    pub outcome: DispatchOutcome,
    pub elapsed: Duration,
}

/// Probe, select and dispatch one file, returning errors directly.
pub struct SingleFileExtractor {
    prober: Arc<dyn TrackProber>,
    dispatcher: Dispatcher,
    preferences: SelectionPreferences,
    planner: OutputPlanner,
    retry: RetryPolicy,
    temp_root: PathBuf,
    preserve_intermediate: bool,
    progress: Option<OcrProgressCallback>,
}

impl SingleFileExtractor {
    pub fn new(settings: &Settings, tools: ToolSet) -> Self {
        Self {
            prober: tools.prober,
            dispatcher: Dispatcher::from_settings(settings, tools.extractor, tools.ocr),
            preferences: SelectionPreferences::from_settings(&settings.extraction),
            planner: OutputPlanner::from_settings(&settings.paths, &settings.extraction),
            retry: RetryPolicy::from_settings(&settings.cleanup),
            temp_root: PathBuf::from(&settings.paths.temp_root),
            preserve_intermediate: settings.extraction.preserve_intermediate_files,
            progress: None,
        }
    }

    pub fn with_preferences(mut self, preferences: SelectionPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// Forward OCR progress updates.
    pub fn with_progress(mut self, progress: OcrProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub async fn extract(
        &mut self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<SingleFileOutcome, PipelineError> {
        let clock = Instant::now();
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let tracks = self
            .prober
            .probe(path, cancel)
            .await
            .map_err(|e| PipelineError::probe(path, e))?;

        let selected = select_track(&tracks, &self.preferences)
            .cloned()
            .ok_or_else(|| PipelineError::NoSuitableTrack {
                path: path.to_path_buf(),
            })?;
        tracing::info!(
            "{}: selected track {} ({} {})",
            path.display(),
            selected.id(),
            selected.codec(),
            selected.language()
        );

        let output_path = self.planner.assign(path, &selected);
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::io("create output directory", e))?;
        }

        let work_dir = self
            .temp_root
            .join(format!("single-{}", Local::now().format("%Y%m%d-%H%M%S%3f")));
        let result = self
            .dispatcher
            .dispatch(
                DispatchRequest {
                    source: path,
                    track: &selected,
                    output_path: &output_path,
                    work_dir: &work_dir,
                    progress: self.progress.clone(),
                },
                cancel,
            )
            .await;

        if !self.preserve_intermediate && work_dir.exists() {
            if let Err(e) = remove_dir_with_retry(&work_dir, &self.retry).await {
                tracing::warn!("{}", e);
            }
        }

        Ok(SingleFileOutcome {
            source: path.to_path_buf(),
            tracks,
            selected,
            outcome: result?,
            elapsed: clock.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::dispatch::ExtractionMethod;
    use crate::models::CorrectionLevel;
    use crate::test_support::{FakeExtractor, FakeOcr, FakeProber};

    fn settings(dir: &TempDir) -> Settings {
        let mut settings = Settings::default();
        settings.paths.output_folder = dir.path().join("out").to_string_lossy().into_owned();
        settings.paths.temp_root = dir.path().join("tmp").to_string_lossy().into_owned();
        settings.correction.level = CorrectionLevel::Standard;
        settings
    }

    fn tools(prober: FakeProber, ocr: FakeOcr) -> ToolSet {
        ToolSet::new(Arc::new(prober), Arc::new(FakeExtractor::new("unused")), Arc::new(ocr))
    }

    #[tokio::test]
    async fn picks_forced_track_and_runs_ocr() {
        let dir = tempdir().unwrap();
        let tracks = vec![
            SubtitleTrack::builder(2, 2, "S_HDMV/PGS").language("eng").build(),
            SubtitleTrack::builder(3, 3, "S_HDMV/PGS").language("eng").forced(true).build(),
        ];
        let prober = FakeProber::new().with_tracks("/media/film.mkv", tracks);
        let mut settings = settings(&dir);
        settings.extraction.prefer_forced = true;
        let mut extractor = SingleFileExtractor::new(&settings, tools(prober, FakeOcr::new("Tliey left")));

        let result = extractor
            .extract(Path::new("/media/film.mkv"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.tracks.len(), 2);
        assert_eq!(result.selected.id(), 3);
        match &result.outcome {
            DispatchOutcome::Extracted { output_path, method, .. } => {
                assert_eq!(*method, ExtractionMethod::Ocr);
                assert_eq!(output_path, &dir.path().join("out").join("film.eng.forced.srt"));
                assert_eq!(std::fs::read_to_string(output_path).unwrap(), "They left");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("tmp"))
            .map(|entries| entries.collect())
            .unwrap_or_default();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn errors_are_returned_directly() {
        let dir = tempdir().unwrap();
        let prober = FakeProber::new().with_tracks("/media/empty.mkv", vec![]);
        let mut extractor = SingleFileExtractor::new(&settings(&dir), tools(prober, FakeOcr::new("")));

        let err = extractor
            .extract(Path::new("/media/empty.mkv"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoSuitableTrack { .. }));

        let err = extractor
            .extract(Path::new("/media/unknown.mkv"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ProbeFailed { .. }));
    }

    #[tokio::test]
    async fn ocr_failure_surfaces_and_cleans_up() {
        let dir = tempdir().unwrap();
        let prober = FakeProber::new().with_tracks(
            "/media/film.mkv",
            vec![SubtitleTrack::builder(2, 2, "S_DVBSUB").language("ger").build()],
        );
        let mut extractor = SingleFileExtractor::new(&settings(&dir), tools(prober, FakeOcr::failing()));

        let err = extractor
            .extract(Path::new("/media/film.mkv"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::OcrFailed { track_id: 2, .. }));
        let leftovers = std::fs::read_dir(dir.path().join("tmp")).map(|e| e.count()).unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let dir = tempdir().unwrap();
        let mut extractor =
            SingleFileExtractor::new(&settings(&dir), tools(FakeProber::new(), FakeOcr::new("")));
        let token = CancellationToken::new();
        token.cancel();

        let err = extractor.extract(Path::new("/media/a.mkv"), &token).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
