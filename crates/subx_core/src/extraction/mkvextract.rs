//! mkvextract wrapper.
//!
//! Both text and bitmap streams come out through `mkvextract tracks`; the
//! split into two trait methods lets the dispatcher route them to
//! different destinations.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::runner::ToolCommand;
use super::traits::SubtitleExtractor;
use super::types::{ensure_exists, ensure_output, ToolResult};
use crate::config::ToolSettings;

/// [`SubtitleExtractor`] backed by mkvextract.
#[derive(Debug, Clone)]
pub struct MkvextractExtractor {
    program: String,
    timeout: Duration,
    kill_grace: Duration,
}

impl MkvextractExtractor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: Duration::from_secs(600),
            kill_grace: Duration::from_secs(3),
        }
    }

    pub fn from_settings(tools: &ToolSettings) -> Self {
        Self {
            program: tools.mkvextract.clone(),
            timeout: tools.tool_timeout(),
            kill_grace: tools.kill_grace(),
        }
    }

    /// Build the `mkvextract <src> tracks <id>:<dest>` invocation.
    pub fn command(&self, source: &Path, extract_id: usize, dest: &Path) -> ToolCommand {
        let track_spec = format!("{}:{}", extract_id, dest.display());
        ToolCommand::new(&self.program)
            .arg(source)
            .arg("tracks")
            .arg(track_spec)
            .timeout(self.timeout)
            .kill_grace(self.kill_grace)
            .accept_exit_code(1)
    }

    /// Extract a single track from a container.
    async fn extract_track(
        &self,
        source: &Path,
        extract_id: usize,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> ToolResult<()> {
        ensure_exists(source)?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let output = self.command(source, extract_id, dest).run(cancel).await?;
        if output.exit_code != 0 {
            tracing::warn!(
                "{} reported warnings for track {}: {}",
                self.program,
                extract_id,
                output.stdout.lines().last().unwrap_or("").trim()
            );
        }

        ensure_output(dest)?;

        tracing::debug!(
            "Extracted track {} from {} to {}",
            extract_id,
            source.display(),
            dest.display()
        );

        Ok(())
    }
}

#[async_trait]
impl SubtitleExtractor for MkvextractExtractor {
    async fn extract_text(
        &self,
        source: &Path,
        extract_id: usize,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> ToolResult<()> {
        self.extract_track(source, extract_id, dest, cancel).await
    }

    async fn extract_image(
        &self,
        source: &Path,
        extract_id: usize,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> ToolResult<()> {
        self.extract_track(source, extract_id, dest, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ToolError;
    use std::path::PathBuf;

    #[test]
    fn command_line_layout() {
        let extractor = MkvextractExtractor::new("mkvextract");
        let cmd = extractor.command(
            Path::new("/media/show.mkv"),
            3,
            &PathBuf::from("/tmp/work/track2.sup"),
        );
        assert_eq!(
            cmd.display(),
            "mkvextract /media/show.mkv tracks 3:/tmp/work/track2.sup"
        );
    }

    #[tokio::test]
    async fn missing_source_is_reported() {
        let extractor = MkvextractExtractor::new("mkvextract");
        let err = extractor
            .extract_text(
                Path::new("/nonexistent/show.mkv"),
                2,
                Path::new("/tmp/out.srt"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::FileNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn silent_tool_without_output_is_output_missing() {
        // `true` accepts any arguments and writes nothing
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("show.mkv");
        std::fs::write(&source, b"x").unwrap();

        let extractor = MkvextractExtractor::new("true");
        let err = extractor
            .extract_image(&source, 2, &dir.path().join("out.sup"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::OutputMissing(_)));
    }
}
