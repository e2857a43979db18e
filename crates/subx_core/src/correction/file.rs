//! In-place correction of subtitle files.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use super::engine::CorrectionEngine;

/// Errors writing corrected output.
///
/// Problems reading the input never surface here: an unreadable file is
/// left as it is and reported as unchanged.
#[derive(Error, Debug)]
pub enum CorrectionError {
    #[error("Failed to write backup {}: {source}", .path.display())]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write corrected file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a file correction did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileCorrectionReport {
    pub rules_triggered: usize,
    pub passes_run: u32,
    pub changed: bool,
    pub backup_path: Option<PathBuf>,
}

/// Backup location for `path`: `episode.srt` becomes `episode.srt.bak`.
pub fn backup_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// Correct a text subtitle file in place.
///
/// With `create_backup` the original bytes are copied to
/// [`backup_path_for`] before the file is overwritten. Nothing is written
/// when no rule fires.
pub fn correct_file(
    path: &Path,
    engine: &CorrectionEngine,
    create_backup: bool,
) -> Result<FileCorrectionReport, CorrectionError> {
    if !engine.level().is_enabled() {
        return Ok(FileCorrectionReport::default());
    }

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Skipping correction of {}: {}", path.display(), e);
            return Ok(FileCorrectionReport::default());
        }
    };

    let content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(_) => {
            tracing::warn!(
                "Skipping correction of {}: not valid UTF-8",
                path.display()
            );
            return Ok(FileCorrectionReport::default());
        }
    };

    let outcome = engine.correct(&content);
    let mut report = FileCorrectionReport {
        rules_triggered: outcome.rules_triggered,
        passes_run: outcome.passes_run,
        changed: outcome.changed(),
        backup_path: None,
    };

    if !report.changed {
        return Ok(report);
    }

    if create_backup {
        let backup = backup_path_for(path);
        fs::write(&backup, content.as_bytes()).map_err(|source| CorrectionError::Backup {
            path: backup.clone(),
            source,
        })?;
        report.backup_path = Some(backup);
    }

    write_replacing(path, &outcome.text).map_err(|source| CorrectionError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        "Corrected {}: {} rules over {} passes",
        path.display(),
        report.rules_triggered,
        report.passes_run
    );

    Ok(report)
}

/// Write through a sibling temp file and rename over the target.
fn write_replacing(path: &Path, content: &str) -> std::io::Result<()> {
    let mut temp = path.as_os_str().to_os_string();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    {
        let mut file = fs::File::create(&temp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }

    fs::rename(&temp, path)
}
