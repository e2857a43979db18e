//! Types for external tool operations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Error type for prober, extractor and OCR invocations.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Input file does not exist.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The program could not be started.
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The program exited with a failing status.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    /// The program exceeded its time budget and was killed.
    #[error("{tool} timed out after {}s", .after.as_secs())]
    Timeout { tool: String, after: Duration },

    /// The run was cancelled while the program was running.
    #[error("{tool} cancelled")]
    Cancelled { tool: String },

    /// Tool output could not be understood.
    #[error("Failed to parse {tool} output: {message}")]
    Parse { tool: String, message: String },

    /// The program succeeded but the expected file is missing or empty.
    #[error("Output file missing or empty: {}", .0.display())]
    OutputMissing(PathBuf),

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    pub fn spawn(tool: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            tool: tool.into(),
            source,
        }
    }

    pub fn command_failed(tool: impl Into<String>, exit_code: i32, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            tool: tool.into(),
            exit_code,
            message: message.into(),
        }
    }

    pub fn parse(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn cancelled(tool: impl Into<String>) -> Self {
        Self::Cancelled { tool: tool.into() }
    }

    /// Whether this error is a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Fail with `FileNotFound` unless `path` exists.
pub(crate) fn ensure_exists(path: &Path) -> ToolResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(ToolError::FileNotFound(path.to_path_buf()))
    }
}

/// Fail with `OutputMissing` unless `path` is a non-empty file.
pub(crate) fn ensure_output(path: &Path) -> ToolResult<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        _ => Err(ToolError::OutputMissing(path.to_path_buf())),
    }
}

/// Progress reported by an OCR engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrProgress {
    /// Units (subtitle images) processed so far.
    pub processed: u64,
    /// Total units, when known.
    pub total: u64,
    /// Engine phase label, e.g. "ocr" or "write".
    pub phase: Option<String>,
}

impl OcrProgress {
    /// Completion percentage (0 when the total is unknown).
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.processed.min(self.total) * 100) / self.total) as u32
    }
}

/// Result of a finished OCR invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OcrReport {
    /// Units recognised, from the last progress line seen.
    pub units: Option<u64>,
    /// Correction rules applied while writing.
    pub rules_triggered: usize,
}
