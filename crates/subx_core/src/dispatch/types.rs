//! Dispatcher result types.

use std::path::PathBuf;

use serde::Serialize;

use crate::models::SubtitleCodec;

/// How the output file was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Text stream copied out of the container.
    TextCopy,
    /// Bitmap stream dumped and run through OCR.
    Ocr,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextCopy => "text copy",
            Self::Ocr => "OCR",
        }
    }
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happened to the intermediate bitmap dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum CleanupStatus {
    /// Text path, nothing to clean.
    NotNeeded,
    Removed,
    /// Kept because intermediate files are preserved.
    Preserved,
    /// Deletion gave up. The extraction result is unaffected.
    Failed(String),
}

impl CleanupStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Successful routing of one track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum DispatchOutcome {
    Extracted {
        output_path: PathBuf,
        method: ExtractionMethod,
        /// Correction rules applied to the written file.
        rules_triggered: usize,
        /// Subtitle images recognised, for the OCR path.
        ocr_units: Option<u64>,
        cleanup: CleanupStatus,
    },
    /// The codec needs a separate interactive tool; nothing was written.
    ManualToolRequired { codec: SubtitleCodec, guidance: String },
}

impl DispatchOutcome {
    pub fn output_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Extracted { output_path, .. } => Some(output_path),
            Self::ManualToolRequired { .. } => None,
        }
    }
}
