//! External OCR engine adapter.
//!
//! The OCR program is configured as a program name plus an argument
//! template. Placeholders in the template:
//!
//! | Placeholder | Value |
//! |---|---|
//! | `{input}` | bitmap stream dumped by the extractor |
//! | `{output}` | text subtitle file to write |
//! | `{lang}` | ISO 639-2/B language code of the track |
//! | `{lang2}` | ISO 639-1 code, or the 639-2 code when none exists |
//!
//! Progress is read from stdout lines shaped like `[phase] 12/340` (the
//! bracketed phase is optional). Other lines are ignored.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use super::runner::ToolCommand;
use super::traits::{OcrEngine, OcrRequest};
use super::types::{ensure_exists, ensure_output, OcrProgress, OcrReport, ToolResult};
use crate::config::{CorrectionSettings, ToolSettings};
use crate::correction::{correct_file, CorrectionEngine};
use crate::models::two_letter_code;

static PROGRESS_LINE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\[(?P<phase>[^\]]+)\]\s*)?(?P<done>\d+)\s*/\s*(?P<total>\d+)").ok()
});

/// Parse one stdout line into a progress update.
pub fn parse_progress_line(line: &str) -> Option<OcrProgress> {
    let caps = PROGRESS_LINE.as_ref()?.captures(line)?;
    Some(OcrProgress {
        processed: caps.name("done")?.as_str().parse().ok()?,
        total: caps.name("total")?.as_str().parse().ok()?,
        phase: caps.name("phase").map(|p| p.as_str().trim().to_string()),
    })
}

/// [`OcrEngine`] that shells out to a configurable OCR program.
#[derive(Debug, Clone)]
pub struct ExternalOcr {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    kill_grace: Duration,
    correction: CorrectionEngine,
}

impl ExternalOcr {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let tools = ToolSettings::default();
        Self {
            program: program.into(),
            args,
            timeout: tools.ocr_timeout(),
            kill_grace: tools.kill_grace(),
            correction: CorrectionEngine::from_settings(&CorrectionSettings::default()),
        }
    }

    pub fn from_settings(tools: &ToolSettings, correction: &CorrectionSettings) -> Self {
        Self {
            program: tools.ocr_program.clone(),
            args: tools.ocr_args.clone(),
            timeout: tools.ocr_timeout(),
            kill_grace: tools.kill_grace(),
            correction: CorrectionEngine::from_settings(correction),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Expand the argument template for one request.
    pub fn command(&self, request: &OcrRequest) -> ToolCommand {
        let input = request.input.to_string_lossy();
        let output = request.output.to_string_lossy();
        let lang2: &str = match two_letter_code(&request.language) {
            Some(code) => code,
            None => &request.language,
        };

        let args = self.args.iter().map(|arg| {
            arg.replace("{input}", &input)
                .replace("{output}", &output)
                .replace("{lang2}", lang2)
                .replace("{lang}", &request.language)
        });

        ToolCommand::new(&self.program)
            .args(args)
            .timeout(self.timeout)
            .kill_grace(self.kill_grace)
    }
}

#[async_trait]
impl OcrEngine for ExternalOcr {
    async fn recognize(&self, request: OcrRequest, cancel: &CancellationToken) -> ToolResult<OcrReport> {
        ensure_exists(&request.input)?;
        if let Some(parent) = request.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut report = OcrReport::default();
        let progress = request.progress.clone();

        self.command(&request)
            .run_with_lines(cancel, |line| {
                if let Some(update) = parse_progress_line(line) {
                    report.units = Some(update.total.max(update.processed));
                    if let Some(callback) = &progress {
                        callback(&update);
                    }
                }
            })
            .await?;

        ensure_output(&request.output)?;

        if request.correct_on_write {
            report.rules_triggered = self.correct_output(&request.output).await;
        }

        tracing::debug!(
            "OCR wrote {} ({} units, {} corrections)",
            request.output.display(),
            report.units.unwrap_or(0),
            report.rules_triggered
        );

        Ok(report)
    }
}

impl ExternalOcr {
    /// Correct the recognised text. The OCR result stands even when this
    /// fails.
    async fn correct_output(&self, output: &Path) -> usize {
        let path = output.to_path_buf();
        let engine = self.correction;
        match tokio::task::spawn_blocking(move || correct_file(&path, &engine, false)).await {
            Ok(Ok(report)) => report.rules_triggered,
            Ok(Err(e)) => {
                tracing::warn!("OCR output {} left uncorrected: {}", output.display(), e);
                0
            }
            Err(e) => {
                tracing::warn!("Correction task for {} failed: {}", output.display(), e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::types::ToolError;
    use super::*;
    use crate::models::CorrectionLevel;
    use std::path::PathBuf;
    use std::sync::Arc;

    #[test]
    fn parses_progress_lines() {
        assert_eq!(
            parse_progress_line("[ocr] 12/340"),
            Some(OcrProgress {
                processed: 12,
                total: 340,
                phase: Some("ocr".to_string()),
            })
        );
        assert_eq!(
            parse_progress_line("  7 / 9"),
            Some(OcrProgress {
                processed: 7,
                total: 9,
                phase: None,
            })
        );
        assert_eq!(parse_progress_line("Loading model..."), None);
    }

    #[test]
    fn expands_argument_template() {
        let ocr = ExternalOcr::new(
            "ocr-tool",
            vec![
                "-i".to_string(),
                "{input}".to_string(),
                "-o".to_string(),
                "{output}".to_string(),
                "--lang={lang2}".to_string(),
                "--tess={lang}".to_string(),
            ],
        );
        let request = OcrRequest::new(
            PathBuf::from("/tmp/w/track3.sup"),
            PathBuf::from("/media/show.eng.srt"),
            "ger",
        );
        assert_eq!(
            ocr.command(&request).display(),
            "ocr-tool -i /tmp/w/track3.sup -o /media/show.eng.srt --lang=de --tess=ger"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_script_reports_progress_and_corrects() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("track1.sup");
        let output = dir.path().join("out.srt");
        std::fs::write(&input, b"pgs").unwrap();

        let script = "echo '[ocr] 1/2'; echo '[ocr] 2/2'; \
                      printf '1\\n00:00:01,000 --> 00:00:02,000\\ntlie  end\\n' > \"$1\"";
        let ocr = ExternalOcr::new(
            "sh",
            vec![
                "-c".to_string(),
                script.to_string(),
                "ocr".to_string(),
                "{output}".to_string(),
            ],
        );

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let request = OcrRequest::new(&input, &output, "eng")
            .with_correction(true)
            .with_progress(Arc::new(move |p: &OcrProgress| sink.lock().push(p.percent())));

        let report = ocr.recognize(request, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.units, Some(2));
        assert!(report.rules_triggered >= 2);
        assert_eq!(*seen.lock(), vec![50, 100]);
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "1\n00:00:01,000 --> 00:00:02,000\nthe end\n"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn without_correction_output_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("track1.sup");
        let output = dir.path().join("out.srt");
        std::fs::write(&input, b"pgs").unwrap();

        let ocr = ExternalOcr::new(
            "sh",
            vec![
                "-c".to_string(),
                "printf 'tlie  end\\n' > \"$1\"".to_string(),
                "ocr".to_string(),
                "{output}".to_string(),
            ],
        );
        let request = OcrRequest::new(&input, &output, "eng");
        let report = ocr.recognize(request, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.rules_triggered, 0);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "tlie  end\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn blocked_correction_keeps_recognised_text() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("track1.sup");
        let output = dir.path().join("out.srt");
        std::fs::write(&input, b"pgs").unwrap();
        // The corrected text is written through `out.srt.tmp`.
        std::fs::create_dir(dir.path().join("out.srt.tmp")).unwrap();

        let ocr = ExternalOcr::new(
            "sh",
            vec![
                "-c".to_string(),
                "printf 'tlie  end\\n' > \"$1\"".to_string(),
                "ocr".to_string(),
                "{output}".to_string(),
            ],
        );
        let request = OcrRequest::new(&input, &output, "eng").with_correction(true);
        let report = ocr.recognize(request, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.rules_triggered, 0);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "tlie  end\n");
    }

    #[tokio::test]
    async fn missing_input_is_reported() {
        let ocr = ExternalOcr::new("ocr-tool", Vec::new());
        let request = OcrRequest::new("/nonexistent/track.sup", "/tmp/out.srt", "eng");
        let err = ocr.recognize(request, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::FileNotFound(_)));
    }

    #[test]
    fn correction_follows_settings() {
        let settings = CorrectionSettings {
            level: CorrectionLevel::Off,
            thorough_max_passes: 4,
            create_backup: false,
        };
        let ocr = ExternalOcr::from_settings(&ToolSettings::default(), &settings);
        assert_eq!(ocr.correction.level(), CorrectionLevel::Off);
        assert_eq!(ocr.correction.max_passes(), 4);
    }
}
