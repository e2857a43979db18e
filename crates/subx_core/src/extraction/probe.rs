//! Subtitle track probing using `mkvmerge -J`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::runner::ToolCommand;
use super::traits::TrackProber;
use super::types::{ensure_exists, ToolError, ToolResult};
use crate::config::ToolSettings;
use crate::models::{SubtitleTrack, UNDETERMINED};

/// [`TrackProber`] backed by mkvmerge's JSON identification output.
#[derive(Debug, Clone)]
pub struct MkvmergeProber {
    program: String,
    timeout: Duration,
    kill_grace: Duration,
}

impl MkvmergeProber {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: Duration::from_secs(600),
            kill_grace: Duration::from_secs(3),
        }
    }

    pub fn from_settings(tools: &ToolSettings) -> Self {
        Self {
            program: tools.mkvmerge.clone(),
            timeout: tools.tool_timeout(),
            kill_grace: tools.kill_grace(),
        }
    }
}

#[async_trait]
impl TrackProber for MkvmergeProber {
    async fn probe(&self, path: &Path, cancel: &CancellationToken) -> ToolResult<Vec<SubtitleTrack>> {
        ensure_exists(path)?;

        tracing::debug!("Probing file: {}", path.display());

        let output = ToolCommand::new(&self.program)
            .arg("-J")
            .arg(path)
            .timeout(self.timeout)
            .kill_grace(self.kill_grace)
            .accept_exit_code(1)
            .run(cancel)
            .await?;

        let json: Value = serde_json::from_str(&output.stdout)
            .map_err(|e| ToolError::parse(&self.program, e.to_string()))?;

        parse_subtitle_tracks(&json).map_err(|message| ToolError::parse(&self.program, message))
    }
}

/// Map the `tracks[]` of mkvmerge JSON to subtitle tracks.
///
/// Non-subtitle tracks are skipped. Display ids are 1-based among the
/// subtitle tracks; extract ids are the container track ids.
pub fn parse_subtitle_tracks(json: &Value) -> Result<Vec<SubtitleTrack>, String> {
    let recognized = json
        .get("container")
        .and_then(|c| c.get("recognized"))
        .and_then(|r| r.as_bool())
        .unwrap_or(true);
    if !recognized {
        let reason = json
            .get("errors")
            .and_then(|e| e.as_array())
            .and_then(|e| e.first())
            .and_then(|e| e.as_str())
            .unwrap_or("container format not recognized");
        return Err(reason.to_string());
    }

    let Some(tracks) = json.get("tracks").and_then(|t| t.as_array()) else {
        return Ok(Vec::new());
    };

    let mut result = Vec::new();
    for track in tracks {
        if track.get("type").and_then(|t| t.as_str()) != Some("subtitles") {
            continue;
        }
        let Some(extract_id) = track.get("id").and_then(|i| i.as_u64()) else {
            tracing::warn!("Skipping subtitle track without id");
            continue;
        };
        result.push(parse_track(track, result.len() + 1, extract_id as usize));
    }

    Ok(result)
}

fn parse_track(track: &Value, display_id: usize, extract_id: usize) -> SubtitleTrack {
    let properties = track.get("properties");
    let prop_str = |key: &str| {
        properties
            .and_then(|p| p.get(key))
            .and_then(|v| v.as_str())
    };
    let prop_bool = |key: &str| {
        properties
            .and_then(|p| p.get(key))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    };

    let codec_id = prop_str("codec_id")
        .or_else(|| track.get("codec").and_then(|c| c.as_str()))
        .unwrap_or("");

    // language_ietf is absent on older mkvmerge builds
    let language = prop_str("language")
        .filter(|l| !l.is_empty() && *l != UNDETERMINED)
        .or_else(|| prop_str("language_ietf"))
        .unwrap_or("");

    let mut builder = SubtitleTrack::builder(display_id, extract_id, codec_id)
        .language(language)
        .forced(prop_bool("forced_track"))
        .default_track(prop_bool("default_track"))
        .closed_caption(prop_bool("flag_hearing_impaired"))
        .bitrate(prop_str("tag_bps").and_then(|v| v.trim().parse().ok()))
        .frame_count(prop_str("tag_number_of_frames").and_then(|v| v.trim().parse().ok()))
        .duration(prop_str("tag_duration").and_then(parse_tag_duration));

    if let Some(name) = prop_str("track_name") {
        builder = builder.name(name);
    }

    builder.build()
}

/// Parse a Matroska `DURATION` tag such as `00:24:01.042000000`.
fn parse_tag_duration(value: &str) -> Option<Duration> {
    let mut parts = value.trim().split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds = parts.next()?;
    if parts.next().is_some() || minutes >= 60 {
        return None;
    }

    let (whole, fraction) = seconds.split_once('.').unwrap_or((seconds, ""));
    let whole: u64 = whole.parse().ok()?;
    if whole >= 60 || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    // Nanosecond precision at most
    let digits = &fraction[..fraction.len().min(9)];
    let nanos = if digits.is_empty() {
        0
    } else {
        digits.parse::<u32>().ok()? * 10u32.pow(9 - digits.len() as u32)
    };

    Some(Duration::new(hours * 3600 + minutes * 60 + whole, nanos))
}
