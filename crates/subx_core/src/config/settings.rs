//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::CorrectionLevel;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Track selection and output naming.
    #[serde(default)]
    pub extraction: ExtractionSettings,

    /// OCR text correction.
    #[serde(default)]
    pub correction: CorrectionSettings,

    /// External tool locations and limits.
    #[serde(default)]
    pub tools: ToolSettings,

    /// Temporary file cleanup retry policy.
    #[serde(default)]
    pub cleanup: CleanupSettings,

    /// Network source handling.
    #[serde(default)]
    pub network: NetworkSettings,
}

/// Path configuration for output, temp, and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Output folder for extracted subtitles. Empty means next to the source.
    #[serde(default)]
    pub output_folder: String,

    /// Root folder for per-run working directories.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_folder: String::new(),
            temp_root: default_temp_root(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Use compact log format.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of tool output lines kept for error diagnosis.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Write a per-run log file into the logs folder.
    #[serde(default = "default_true")]
    pub write_run_log: bool,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            compact: true,
            error_tail: default_error_tail(),
            progress_step: default_progress_step(),
            write_run_log: true,
        }
    }
}

/// Track selection preferences and output naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSettings {
    /// Preferred subtitle language (any ISO 639 form). Empty means no preference.
    #[serde(default = "default_language")]
    pub preferred_language: String,

    /// Prefer forced tracks.
    #[serde(default)]
    pub prefer_forced: bool,

    /// Prefer SDH / closed-caption tracks.
    #[serde(default)]
    pub prefer_closed_caption: bool,

    /// Output filename template; see `output::OutputPattern`.
    #[serde(default = "default_output_pattern")]
    pub output_pattern: String,

    /// Marker substituted for `{forced}` on forced tracks.
    #[serde(default = "default_forced_suffix")]
    pub forced_suffix: String,

    /// Keep per-item working files (image dumps) after processing.
    #[serde(default)]
    pub preserve_intermediate_files: bool,
}

fn default_language() -> String {
    "eng".to_string()
}

fn default_output_pattern() -> String {
    "{base}.{lang}{forced}".to_string()
}

fn default_forced_suffix() -> String {
    ".forced".to_string()
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            preferred_language: default_language(),
            prefer_forced: false,
            prefer_closed_caption: false,
            output_pattern: default_output_pattern(),
            forced_suffix: default_forced_suffix(),
            preserve_intermediate_files: false,
        }
    }
}

/// OCR text correction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionSettings {
    /// Correction level applied to OCR and line-based text output.
    #[serde(default)]
    pub level: CorrectionLevel,

    /// Pass cap for the thorough level.
    #[serde(default = "default_thorough_passes")]
    pub thorough_max_passes: u32,

    /// Write `<file>.bak` before correcting a file in place.
    #[serde(default)]
    pub create_backup: bool,
}

fn default_thorough_passes() -> u32 {
    3
}

impl Default for CorrectionSettings {
    fn default() -> Self {
        Self {
            level: CorrectionLevel::default(),
            thorough_max_passes: default_thorough_passes(),
            create_backup: false,
        }
    }
}

/// External tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Container prober (mkvmerge).
    #[serde(default = "default_mkvmerge")]
    pub mkvmerge: String,

    /// Stream extractor (mkvextract).
    #[serde(default = "default_mkvextract")]
    pub mkvextract: String,

    /// OCR program.
    #[serde(default = "default_ocr_program")]
    pub ocr_program: String,

    /// OCR argument template with `{input}`, `{output}` and `{lang}` placeholders.
    #[serde(default = "default_ocr_args")]
    pub ocr_args: Vec<String>,

    /// Upper bound for probe and extract invocations, in seconds.
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Upper bound for one OCR invocation, in seconds.
    #[serde(default = "default_ocr_timeout")]
    pub ocr_timeout_secs: u64,

    /// Time allowed for a killed process to exit, in milliseconds.
    #[serde(default = "default_kill_grace")]
    pub kill_grace_ms: u64,
}

fn default_mkvmerge() -> String {
    "mkvmerge".to_string()
}

fn default_mkvextract() -> String {
    "mkvextract".to_string()
}

fn default_ocr_program() -> String {
    "subx-ocr".to_string()
}

fn default_ocr_args() -> Vec<String> {
    vec![
        "--input".to_string(),
        "{input}".to_string(),
        "--output".to_string(),
        "{output}".to_string(),
        "--lang".to_string(),
        "{lang}".to_string(),
    ]
}

fn default_tool_timeout() -> u64 {
    600
}

fn default_ocr_timeout() -> u64 {
    3600
}

fn default_kill_grace() -> u64 {
    3000
}

impl ToolSettings {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_secs)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            mkvmerge: default_mkvmerge(),
            mkvextract: default_mkvextract(),
            ocr_program: default_ocr_program(),
            ocr_args: default_ocr_args(),
            tool_timeout_secs: default_tool_timeout(),
            ocr_timeout_secs: default_ocr_timeout(),
            kill_grace_ms: default_kill_grace(),
        }
    }
}

/// Retry policy for deleting temporary files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupSettings {
    /// Maximum number of delete attempts.
    #[serde(default = "default_cleanup_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, doubled after each failure.
    #[serde(default = "default_cleanup_initial_delay")]
    pub initial_delay_ms: u64,

    /// Cap on the total time spent waiting between attempts.
    #[serde(default = "default_cleanup_max_wait")]
    pub max_total_wait_ms: u64,
}

fn default_cleanup_attempts() -> u32 {
    5
}

fn default_cleanup_initial_delay() -> u64 {
    100
}

fn default_cleanup_max_wait() -> u64 {
    3000
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_cleanup_attempts(),
            initial_delay_ms: default_cleanup_initial_delay(),
            max_total_wait_ms: default_cleanup_max_wait(),
        }
    }
}

/// Processing-time estimates and network handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Fixed per-file overhead in seconds.
    #[serde(default = "default_base_seconds")]
    pub base_seconds: f64,

    /// Estimated seconds per GiB of source data on local storage.
    #[serde(default = "default_seconds_per_gib")]
    pub seconds_per_gib: f64,

    /// Multiplier applied to estimates for network sources.
    #[serde(default = "default_network_multiplier")]
    pub network_multiplier: f64,
}

fn default_base_seconds() -> f64 {
    5.0
}

fn default_seconds_per_gib() -> f64 {
    12.0
}

fn default_network_multiplier() -> f64 {
    2.5
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            base_seconds: default_base_seconds(),
            seconds_per_gib: default_seconds_per_gib(),
            network_multiplier: default_network_multiplier(),
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Logging,
    Extraction,
    Correction,
    Tools,
    Cleanup,
    Network,
}

impl ConfigSection {
    /// All sections, in file order.
    pub fn all() -> &'static [ConfigSection] {
        &[
            Self::Paths,
            Self::Logging,
            Self::Extraction,
            Self::Correction,
            Self::Tools,
            Self::Cleanup,
            Self::Network,
        ]
    }

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Extraction => "extraction",
            ConfigSection::Correction => "correction",
            ConfigSection::Tools => "tools",
            ConfigSection::Cleanup => "cleanup",
            ConfigSection::Network => "network",
        }
    }

    /// Comment written above the section in generated files.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Output and working directories",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Extraction => "Track selection and output naming",
            ConfigSection::Correction => "OCR text correction",
            ConfigSection::Tools => "External tools",
            ConfigSection::Cleanup => "Temporary file cleanup",
            ConfigSection::Network => "Processing time estimates",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[correction]"));
        assert!(toml.contains("output_pattern"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[correction]\nlevel = \"thorough\"";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        // Custom value preserved
        assert_eq!(parsed.correction.level, CorrectionLevel::Thorough);
        // Defaults applied for missing
        assert_eq!(parsed.correction.thorough_max_passes, 3);
        assert_eq!(parsed.extraction.forced_suffix, ".forced");
        assert_eq!(parsed.cleanup.max_attempts, 5);
    }

    #[test]
    fn tool_durations() {
        let tools = ToolSettings::default();
        assert_eq!(tools.tool_timeout(), Duration::from_secs(600));
        assert_eq!(tools.kill_grace(), Duration::from_millis(3000));
    }
}
