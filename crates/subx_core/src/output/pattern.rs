//! Output filename templates and collision handling.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::{ExtractionSettings, PathSettings};
use crate::models::{SubtitleCodec, SubtitleTrack};

/// Filename template for extracted subtitles.
///
/// Placeholders: `{base}` (source file stem), `{lang}` (track language),
/// `{forced}` (the forced marker on forced tracks, empty otherwise) and
/// `{track}` (display id of the track).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPattern {
    template: String,
    forced_suffix: String,
}

impl Default for OutputPattern {
    fn default() -> Self {
        Self::from_settings(&ExtractionSettings::default())
    }
}

impl OutputPattern {
    pub fn new(template: impl Into<String>, forced_suffix: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            forced_suffix: forced_suffix.into(),
        }
    }

    pub fn from_settings(settings: &ExtractionSettings) -> Self {
        Self::new(&settings.output_pattern, &settings.forced_suffix)
    }

    /// Render the file stem for `track` of `source`, sanitized.
    pub fn render(&self, source: &Path, track: &SubtitleTrack) -> String {
        let base = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let forced = if track.flags().forced {
            self.forced_suffix.as_str()
        } else {
            ""
        };

        let rendered = self
            .template
            .replace("{base}", &base)
            .replace("{lang}", track.language())
            .replace("{forced}", forced)
            .replace("{track}", &track.id().to_string());

        sanitize_file_stem(&rendered)
    }

    /// Full file name including the extension the written file will have.
    pub fn file_name(&self, source: &Path, track: &SubtitleTrack) -> String {
        format!("{}.{}", self.render(source, track), output_extension(track.codec()))
    }
}

/// Replace characters that are not allowed in file names on common
/// filesystems.
pub(crate) fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Extension of the file the pipeline writes for a codec.
///
/// Bitmap streams are OCR'd to SubRip.
pub fn output_extension(codec: SubtitleCodec) -> &'static str {
    if codec.is_image() {
        "srt"
    } else {
        codec.extension()
    }
}

/// Assigns output paths for a run, avoiding collisions with files on
/// disk and with paths already handed out.
#[derive(Debug, Clone)]
pub struct OutputPlanner {
    pattern: OutputPattern,
    output_folder: Option<PathBuf>,
    assigned: HashSet<PathBuf>,
}

impl OutputPlanner {
    /// `output_folder` of `None` writes next to each source.
    pub fn new(pattern: OutputPattern, output_folder: Option<PathBuf>) -> Self {
        Self {
            pattern,
            output_folder,
            assigned: HashSet::new(),
        }
    }

    pub fn from_settings(paths: &PathSettings, extraction: &ExtractionSettings) -> Self {
        let folder = paths.output_folder.trim();
        let output_folder = (!folder.is_empty()).then(|| PathBuf::from(folder));
        Self::new(OutputPattern::from_settings(extraction), output_folder)
    }

    pub fn pattern(&self) -> &OutputPattern {
        &self.pattern
    }

    /// Directory the output for `source` goes to.
    pub fn output_dir(&self, source: &Path) -> PathBuf {
        match &self.output_folder {
            Some(folder) => folder.clone(),
            None => source
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    /// Reserve a unique output path for `track` of `source`.
    ///
    /// Taken names get ` (2)`, ` (3)`, ... appended to the stem.
    pub fn assign(&mut self, source: &Path, track: &SubtitleTrack) -> PathBuf {
        let dir = self.output_dir(source);
        let stem = self.pattern.render(source, track);
        let ext = output_extension(track.codec());

        let mut candidate = dir.join(format!("{}.{}", stem, ext));
        let mut n = 2;
        while self.is_taken(&candidate) {
            candidate = dir.join(format!("{} ({}).{}", stem, n, ext));
            n += 1;
        }

        self.assigned.insert(candidate.clone());
        candidate
    }

    /// Forget every assignment, e.g. before a new run.
    pub fn reset(&mut self) {
        self.assigned.clear();
    }

    fn is_taken(&self, path: &Path) -> bool {
        self.assigned.contains(path) || path.exists()
    }
}
