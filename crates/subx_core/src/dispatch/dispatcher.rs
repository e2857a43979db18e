//! Codec-keyed routing of a selected track to its extraction path.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::cleanup::{remove_with_retry, RetryPolicy};
use super::types::{CleanupStatus, DispatchOutcome, ExtractionMethod};
use crate::config::Settings;
use crate::correction::{correct_file, CorrectionEngine};
use crate::extraction::{OcrEngine, OcrProgressCallback, OcrRequest, SubtitleExtractor};
use crate::models::{SubtitleCodec, SubtitleTrack};
use crate::orchestrator::PipelineError;

/// Inputs for routing one track.
#[derive(Clone)]
pub struct DispatchRequest<'a> {
    pub source: &'a Path,
    pub track: &'a SubtitleTrack,
    /// Final subtitle file.
    pub output_path: &'a Path,
    /// Scratch directory for intermediate dumps.
    pub work_dir: &'a Path,
    pub progress: Option<OcrProgressCallback>,
}

/// Deletes one intermediate file.
pub type FileRemover = Arc<dyn Fn(&Path) -> io::Result<()> + Send + Sync>;

/// Routes tracks to text copy, OCR or manual handling by codec.
pub struct Dispatcher {
    extractor: Arc<dyn SubtitleExtractor>,
    ocr: Arc<dyn OcrEngine>,
    correction: CorrectionEngine,
    create_backup: bool,
    retry: RetryPolicy,
    preserve_intermediate: bool,
    remove_file: FileRemover,
}

impl Dispatcher {
    pub fn new(extractor: Arc<dyn SubtitleExtractor>, ocr: Arc<dyn OcrEngine>) -> Self {
        Self::from_settings(&Settings::default(), extractor, ocr)
    }

    pub fn from_settings(
        settings: &Settings,
        extractor: Arc<dyn SubtitleExtractor>,
        ocr: Arc<dyn OcrEngine>,
    ) -> Self {
        Self {
            extractor,
            ocr,
            correction: CorrectionEngine::from_settings(&settings.correction),
            create_backup: settings.correction.create_backup,
            retry: RetryPolicy::from_settings(&settings.cleanup),
            preserve_intermediate: settings.extraction.preserve_intermediate_files,
            remove_file: Arc::new(|path: &Path| std::fs::remove_file(path)),
        }
    }

    pub fn with_correction(mut self, correction: CorrectionEngine) -> Self {
        self.correction = correction;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_preserve_intermediate(mut self, preserve: bool) -> Self {
        self.preserve_intermediate = preserve;
        self
    }

    /// Keep a `.bak` copy of text output before correcting it.
    pub fn with_backup(mut self, create_backup: bool) -> Self {
        self.create_backup = create_backup;
        self
    }

    /// Replace how intermediate dumps are deleted.
    pub fn with_file_remover(mut self, remove_file: FileRemover) -> Self {
        self.remove_file = remove_file;
        self
    }

    pub fn correction(&self) -> CorrectionEngine {
        self.correction
    }

    /// Extract `request.track` to `request.output_path`.
    pub async fn dispatch(
        &self,
        request: DispatchRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome, PipelineError> {
        let track = request.track;
        let codec = track.codec();
        tracing::debug!(
            "Dispatching track {} ({}) of {}",
            track.id(),
            codec.name(),
            request.source.display()
        );

        match codec {
            SubtitleCodec::Srt | SubtitleCodec::WebVtt | SubtitleCodec::GenericText => {
                self.extract_text(&request, true, cancel).await
            }
            SubtitleCodec::Ass | SubtitleCodec::Usf | SubtitleCodec::Ttml => {
                self.extract_text(&request, false, cancel).await
            }
            SubtitleCodec::Pgs | SubtitleCodec::Dvb => self.extract_with_ocr(&request, cancel).await,
            SubtitleCodec::VobSub => Ok(DispatchOutcome::ManualToolRequired {
                codec,
                guidance: vobsub_guidance(request.source, track),
            }),
            SubtitleCodec::Unknown => Err(PipelineError::UnsupportedCodec {
                codec: track.codec_id().to_string(),
            }),
        }
    }

    async fn extract_text(
        &self,
        request: &DispatchRequest<'_>,
        correct: bool,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome, PipelineError> {
        let track = request.track;
        check_cancelled(cancel)?;

        if let Err(e) = self
            .extractor
            .extract_text(request.source, track.extract_id(), request.output_path, cancel)
            .await
        {
            discard_partial(request.output_path).await;
            return Err(PipelineError::extraction(track.id(), e));
        }

        let rules_triggered = if correct && self.correction.level().is_enabled() {
            self.correct_output(request.output_path).await
        } else {
            0
        };

        Ok(DispatchOutcome::Extracted {
            output_path: request.output_path.to_path_buf(),
            method: ExtractionMethod::TextCopy,
            rules_triggered,
            ocr_units: None,
            cleanup: CleanupStatus::NotNeeded,
        })
    }

    async fn extract_with_ocr(
        &self,
        request: &DispatchRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome, PipelineError> {
        let track = request.track;
        check_cancelled(cancel)?;

        tokio::fs::create_dir_all(request.work_dir)
            .await
            .map_err(|e| PipelineError::io("create working directory", e))?;

        let dump = request
            .work_dir
            .join(format!("track{}.{}", track.id(), track.codec().extension()));

        let result = self.dump_and_recognize(request, &dump, cancel).await;
        let cleanup = self.cleanup_dump(&dump).await;
        if result.is_err() {
            discard_partial(request.output_path).await;
        }
        let report = result?;

        Ok(DispatchOutcome::Extracted {
            output_path: request.output_path.to_path_buf(),
            method: ExtractionMethod::Ocr,
            rules_triggered: report.rules_triggered,
            ocr_units: report.units,
            cleanup,
        })
    }

    async fn dump_and_recognize(
        &self,
        request: &DispatchRequest<'_>,
        dump: &Path,
        cancel: &CancellationToken,
    ) -> Result<crate::extraction::OcrReport, PipelineError> {
        let track = request.track;

        self.extractor
            .extract_image(request.source, track.extract_id(), dump, cancel)
            .await
            .map_err(|e| PipelineError::extraction(track.id(), e))?;

        check_cancelled(cancel)?;

        let mut ocr_request = OcrRequest::new(dump, request.output_path, track.language())
            .with_correction(self.correction.level().is_enabled());
        if let Some(progress) = &request.progress {
            ocr_request = ocr_request.with_progress(progress.clone());
        }

        self.ocr
            .recognize(ocr_request, cancel)
            .await
            .map_err(|e| PipelineError::ocr(track.id(), e))
    }

    async fn cleanup_dump(&self, dump: &Path) -> CleanupStatus {
        if self.preserve_intermediate {
            return CleanupStatus::Preserved;
        }

        let remove_file = self.remove_file.clone();
        match remove_with_retry(dump, &self.retry, |path| remove_file(path)).await {
            Ok(_) => CleanupStatus::Removed,
            Err(e) => {
                let err = PipelineError::CleanupFailed {
                    path: dump.to_path_buf(),
                    message: e.to_string(),
                };
                tracing::warn!("{}", err);
                CleanupStatus::Failed(e.to_string())
            }
        }
    }

    /// Correct the extracted file in place. A failure leaves the file as
    /// extracted and counts no rules.
    async fn correct_output(&self, path: &Path) -> usize {
        let target: PathBuf = path.to_path_buf();
        let engine = self.correction;
        let backup = self.create_backup;

        match tokio::task::spawn_blocking(move || correct_file(&target, &engine, backup)).await {
            Ok(Ok(report)) => report.rules_triggered,
            Ok(Err(e)) => {
                tracing::warn!("Keeping {} uncorrected: {}", path.display(), e);
                0
            }
            Err(e) => {
                tracing::warn!("Correction task for {} failed: {}", path.display(), e);
                0
            }
        }
    }
}

/// Remove whatever a failed tool left at the output path.
async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not remove partial output {}: {}", path.display(), e),
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

fn vobsub_guidance(source: &Path, track: &SubtitleTrack) -> String {
    format!(
        "VobSub track {} needs manual OCR. Dump it with `mkvextract \"{}\" tracks {}:track{}.sub` \
         and convert the .idx/.sub pair with an interactive VobSub OCR tool.",
        track.id(),
        source.display(),
        track.extract_id(),
        track.id()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CorrectionLevel;
    use crate::test_support::{FakeExtractor, FakeOcr};
    use tempfile::tempdir;

    const RAW: &str = "1\n00:00:01,000 --> 00:00:02,000\nWliat  is tliis ?\n";

    fn track(codec: &str) -> SubtitleTrack {
        SubtitleTrack::builder(1, 2, codec).language("eng").build()
    }

    fn dispatcher(extractor: &Arc<FakeExtractor>, ocr: &Arc<FakeOcr>, level: CorrectionLevel) -> Dispatcher {
        Dispatcher::new(extractor.clone(), ocr.clone())
            .with_correction(CorrectionEngine::new(level))
            .with_retry_policy(RetryPolicy::once())
    }

    #[tokio::test]
    async fn text_track_is_copied_and_corrected() {
        let dir = tempdir().unwrap();
        let extractor = Arc::new(FakeExtractor::new(RAW));
        let ocr = Arc::new(FakeOcr::new("unused"));
        let out = dir.path().join("movie.eng.srt");
        let track = track("S_TEXT/UTF8");

        let outcome = dispatcher(&extractor, &ocr, CorrectionLevel::Standard)
            .dispatch(
                DispatchRequest {
                    source: Path::new("/media/movie.mkv"),
                    track: &track,
                    output_path: &out,
                    work_dir: &dir.path().join("work"),
                    progress: None,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        match outcome {
            DispatchOutcome::Extracted {
                method,
                rules_triggered,
                cleanup,
                ..
            } => {
                assert_eq!(method, ExtractionMethod::TextCopy);
                assert!(rules_triggered > 0);
                assert_eq!(cleanup, CleanupStatus::NotNeeded);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "1\n00:00:01,000 --> 00:00:02,000\nWhat is this?\n"
        );
        assert_eq!(extractor.text_calls(), 1);
        assert_eq!(ocr.calls(), 0);
    }

    #[tokio::test]
    async fn failed_backup_keeps_extracted_text() {
        let dir = tempdir().unwrap();
        let extractor = Arc::new(FakeExtractor::new(RAW));
        let ocr = Arc::new(FakeOcr::new("unused"));
        let out = dir.path().join("movie.eng.srt");
        std::fs::create_dir(crate::correction::backup_path_for(&out)).unwrap();
        let track = track("S_TEXT/UTF8");

        let outcome = dispatcher(&extractor, &ocr, CorrectionLevel::Standard)
            .with_backup(true)
            .dispatch(
                DispatchRequest {
                    source: Path::new("/media/movie.mkv"),
                    track: &track,
                    output_path: &out,
                    work_dir: dir.path(),
                    progress: None,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        match outcome {
            DispatchOutcome::Extracted { rules_triggered, .. } => assert_eq!(rules_triggered, 0),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(std::fs::read_to_string(&out).unwrap(), RAW);
    }

    #[tokio::test]
    async fn failed_extraction_leaves_no_partial_output() {
        let dir = tempdir().unwrap();
        let extractor = Arc::new(FakeExtractor::new(RAW).truncating_for("/media/movie.mkv"));
        let ocr = Arc::new(FakeOcr::new("unused"));
        let out = dir.path().join("movie.eng.srt");
        let track = track("S_TEXT/UTF8");

        let err = dispatcher(&extractor, &ocr, CorrectionLevel::Standard)
            .dispatch(
                DispatchRequest {
                    source: Path::new("/media/movie.mkv"),
                    track: &track,
                    output_path: &out,
                    work_dir: dir.path(),
                    progress: None,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::ExtractionFailed { track_id: 1, .. }));
        assert_eq!(extractor.text_calls(), 1);
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn dump_cleanup_failure_is_reported_not_fatal() {
        let dir = tempdir().unwrap();
        let extractor = Arc::new(FakeExtractor::new(""));
        let ocr = Arc::new(FakeOcr::new("Hello\n"));
        let out = dir.path().join("movie.eng.srt");
        let track = track("S_HDMV/PGS");
        let locked: FileRemover =
            Arc::new(|_: &Path| Err(io::Error::new(io::ErrorKind::PermissionDenied, "file in use")));

        let outcome = dispatcher(&extractor, &ocr, CorrectionLevel::Standard)
            .with_file_remover(locked)
            .dispatch(
                DispatchRequest {
                    source: Path::new("/media/movie.mkv"),
                    track: &track,
                    output_path: &out,
                    work_dir: dir.path(),
                    progress: None,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        match outcome {
            DispatchOutcome::Extracted { cleanup, .. } => {
                assert!(cleanup.is_failed(), "cleanup was {cleanup:?}");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(out.exists());
        assert!(dir.path().join("track1.sup").exists());
    }

    #[tokio::test]
    async fn usf_keeps_its_extension_and_markup() {
        let dir = tempdir().unwrap();
        let xml = "<USFSubtitles><subtitle><text>Wliat  is tliis ?</text></subtitle></USFSubtitles>";
        let extractor = Arc::new(FakeExtractor::new(xml));
        let ocr = Arc::new(FakeOcr::new("unused"));
        let track = track("S_TEXT/USF");
        let out = dir
            .path()
            .join(format!("movie.eng.{}", crate::output::output_extension(track.codec())));

        dispatcher(&extractor, &ocr, CorrectionLevel::Thorough)
            .dispatch(
                DispatchRequest {
                    source: Path::new("/media/movie.mkv"),
                    track: &track,
                    output_path: &out,
                    work_dir: dir.path(),
                    progress: None,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(out.extension().and_then(|e| e.to_str()), Some("usf"));
        assert_eq!(std::fs::read_to_string(&out).unwrap(), xml);
    }

    #[tokio::test]
    async fn ass_is_never_rewritten() {
        let dir = tempdir().unwrap();
        let extractor = Arc::new(FakeExtractor::new("Dialogue: 0,tlie  end"));
        let ocr = Arc::new(FakeOcr::new("unused"));
        let out = dir.path().join("movie.eng.ass");
        let track = track("S_TEXT/ASS");

        dispatcher(&extractor, &ocr, CorrectionLevel::Thorough)
            .dispatch(
                DispatchRequest {
                    source: Path::new("/media/movie.mkv"),
                    track: &track,
                    output_path: &out,
                    work_dir: dir.path(),
                    progress: None,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&out).unwrap(), "Dialogue: 0,tlie  end");
    }

    #[tokio::test]
    async fn image_track_goes_through_ocr_and_dump_is_removed() {
        let dir = tempdir().unwrap();
        let work = dir.path().join("work");
        let extractor = Arc::new(FakeExtractor::new(""));
        let ocr = Arc::new(FakeOcr::new("1\n00:00:01,000 --> 00:00:02,000\nHello\n"));
        let out = dir.path().join("movie.eng.srt");
        let track = track("S_HDMV/PGS");

        let outcome = dispatcher(&extractor, &ocr, CorrectionLevel::Standard)
            .dispatch(
                DispatchRequest {
                    source: Path::new("/media/movie.mkv"),
                    track: &track,
                    output_path: &out,
                    work_dir: &work,
                    progress: None,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let dump = work.join("track1.sup");
        assert_eq!(ocr.inputs(), vec![dump.clone()]);
        assert!(ocr.saw_existing_input());
        assert_eq!(ocr.corrections_requested(), vec![true]);
        assert!(!dump.exists());
        assert!(out.exists());
        match outcome {
            DispatchOutcome::Extracted { method, cleanup, ocr_units, .. } => {
                assert_eq!(method, ExtractionMethod::Ocr);
                assert_eq!(cleanup, CleanupStatus::Removed);
                assert_eq!(ocr_units, Some(1));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn correction_off_disables_ocr_correction() {
        let dir = tempdir().unwrap();
        let extractor = Arc::new(FakeExtractor::new(""));
        let ocr = Arc::new(FakeOcr::new("text\n"));
        let out = dir.path().join("dvb.srt");
        let track = track("S_DVBSUB");

        dispatcher(&extractor, &ocr, CorrectionLevel::Off)
            .with_preserve_intermediate(true)
            .dispatch(
                DispatchRequest {
                    source: Path::new("/media/movie.mkv"),
                    track: &track,
                    output_path: &out,
                    work_dir: dir.path(),
                    progress: None,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(ocr.corrections_requested(), vec![false]);
        assert!(dir.path().join("track1.dvbsub").exists());
    }

    #[tokio::test]
    async fn ocr_failure_still_removes_dump() {
        let dir = tempdir().unwrap();
        let extractor = Arc::new(FakeExtractor::new(""));
        let ocr = Arc::new(FakeOcr::failing());
        let out = dir.path().join("movie.srt");
        let track = track("S_HDMV/PGS");

        let err = dispatcher(&extractor, &ocr, CorrectionLevel::Standard)
            .dispatch(
                DispatchRequest {
                    source: Path::new("/media/movie.mkv"),
                    track: &track,
                    output_path: &out,
                    work_dir: dir.path(),
                    progress: None,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::OcrFailed { track_id: 1, .. }));
        assert!(!dir.path().join("track1.sup").exists());
    }

    #[tokio::test]
    async fn vobsub_requires_manual_tool() {
        let dir = tempdir().unwrap();
        let extractor = Arc::new(FakeExtractor::new(""));
        let ocr = Arc::new(FakeOcr::new(""));
        let track = track("S_VOBSUB");

        let outcome = dispatcher(&extractor, &ocr, CorrectionLevel::Standard)
            .dispatch(
                DispatchRequest {
                    source: Path::new("/media/movie.mkv"),
                    track: &track,
                    output_path: &dir.path().join("x.srt"),
                    work_dir: dir.path(),
                    progress: None,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        match outcome {
            DispatchOutcome::ManualToolRequired { codec, guidance } => {
                assert_eq!(codec, SubtitleCodec::VobSub);
                assert!(guidance.contains("mkvextract"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(extractor.text_calls() + extractor.image_calls(), 0);
    }

    #[tokio::test]
    async fn unknown_codec_is_unsupported() {
        let dir = tempdir().unwrap();
        let extractor = Arc::new(FakeExtractor::new(""));
        let ocr = Arc::new(FakeOcr::new(""));
        let track = track("S_MYSTERY");

        let err = dispatcher(&extractor, &ocr, CorrectionLevel::Standard)
            .dispatch(
                DispatchRequest {
                    source: Path::new("/media/movie.mkv"),
                    track: &track,
                    output_path: &dir.path().join("x.srt"),
                    work_dir: dir.path(),
                    progress: None,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::UnsupportedCodec { ref codec } if codec == "S_MYSTERY"));
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_any_tool_call() {
        let dir = tempdir().unwrap();
        let extractor = Arc::new(FakeExtractor::new(RAW));
        let ocr = Arc::new(FakeOcr::new(""));
        let cancel = CancellationToken::new();
        cancel.cancel();

        for codec in ["S_TEXT/UTF8", "S_HDMV/PGS"] {
            let track = track(codec);
            let err = dispatcher(&extractor, &ocr, CorrectionLevel::Standard)
                .dispatch(
                    DispatchRequest {
                        source: Path::new("/media/movie.mkv"),
                        track: &track,
                        output_path: &dir.path().join("x.srt"),
                        work_dir: dir.path(),
                        progress: None,
                    },
                    &cancel,
                )
                .await
                .unwrap_err();
            assert!(err.is_cancelled());
        }
        assert_eq!(extractor.text_calls() + extractor.image_calls(), 0);
    }
}
