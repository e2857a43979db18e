//! Subtitle track data structure.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::enums::{SubtitleCodec, TrackKind};
use super::language::normalize_language;

/// Disposition flags of a subtitle stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackFlags {
    pub forced: bool,
    pub default: bool,
    pub closed_caption: bool,
}

/// One subtitle stream found inside a container.
///
/// Built once from prober output and never mutated afterwards; the
/// encoding classification, kind and priority are derived in the
/// constructor and stored as plain fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    id: usize,
    extract_id: usize,
    codec_id: String,
    codec: SubtitleCodec,
    language: String,
    flags: TrackFlags,
    name: Option<String>,
    bitrate: Option<u64>,
    frame_count: Option<u64>,
    #[serde(with = "duration_ms")]
    duration: Option<Duration>,
    kind: TrackKind,
    priority: u8,
}

impl SubtitleTrack {
    /// Start building a track from its identifiers and raw codec string.
    pub fn builder(id: usize, extract_id: usize, codec_id: impl Into<String>) -> SubtitleTrackBuilder {
        SubtitleTrackBuilder {
            id,
            extract_id,
            codec_id: codec_id.into(),
            language: None,
            flags: TrackFlags::default(),
            name: None,
            bitrate: None,
            frame_count: None,
            duration: None,
        }
    }

    /// Display identifier (1-based among subtitle tracks).
    pub fn id(&self) -> usize {
        self.id
    }

    /// Identifier handed to the extractor (container track id).
    pub fn extract_id(&self) -> usize {
        self.extract_id
    }

    /// Raw codec string as reported by the prober.
    pub fn codec_id(&self) -> &str {
        &self.codec_id
    }

    pub fn codec(&self) -> SubtitleCodec {
        self.codec
    }

    /// Normalised ISO 639-2/B language code.
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn flags(&self) -> TrackFlags {
        self.flags
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn bitrate(&self) -> Option<u64> {
        self.bitrate
    }

    pub fn frame_count(&self) -> Option<u64> {
        self.frame_count
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Auto-selection priority (higher wins).
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Get a display string for this track.
    pub fn display_name(&self) -> String {
        let name_part = match &self.name {
            Some(name) if !name.is_empty() => format!(" - {}", name),
            _ => String::new(),
        };
        format!(
            "Track {} [{}] ({}, {}){}",
            self.id, self.codec, self.language, self.kind, name_part
        )
    }
}

/// Builder for [`SubtitleTrack`].
#[derive(Debug, Clone)]
pub struct SubtitleTrackBuilder {
    id: usize,
    extract_id: usize,
    codec_id: String,
    language: Option<String>,
    flags: TrackFlags,
    name: Option<String>,
    bitrate: Option<u64>,
    frame_count: Option<u64>,
    duration: Option<Duration>,
}

impl SubtitleTrackBuilder {
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn forced(mut self, forced: bool) -> Self {
        self.flags.forced = forced;
        self
    }

    pub fn default_track(mut self, default: bool) -> Self {
        self.flags.default = default;
        self
    }

    pub fn closed_caption(mut self, closed_caption: bool) -> Self {
        self.flags.closed_caption = closed_caption;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.trim().is_empty() { None } else { Some(name) };
        self
    }

    pub fn bitrate(mut self, bitrate: Option<u64>) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn frame_count(mut self, frame_count: Option<u64>) -> Self {
        self.frame_count = frame_count;
        self
    }

    pub fn duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }

    /// Finish the track, deriving classification, kind and priority.
    ///
    /// A track whose name marks it as SDH / closed caption gets the
    /// closed-caption flag even when the container flag is missing.
    pub fn build(self) -> SubtitleTrack {
        let codec = SubtitleCodec::classify(&self.codec_id);
        let mut flags = self.flags;
        if !flags.closed_caption {
            flags.closed_caption = self.name.as_deref().is_some_and(name_implies_closed_caption);
        }
        let kind = TrackKind::from_flags(flags.forced, flags.closed_caption);
        let language = normalize_language(self.language.as_deref().unwrap_or(""));

        SubtitleTrack {
            id: self.id,
            extract_id: self.extract_id,
            codec_id: self.codec_id,
            codec,
            language,
            flags,
            name: self.name,
            bitrate: self.bitrate,
            frame_count: self.frame_count,
            duration: self.duration,
            kind,
            priority: codec.priority(),
        }
    }
}

fn name_implies_closed_caption(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if lower.contains("closed caption") || lower.contains("hearing impaired") {
        return true;
    }
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| word == "sdh" || word == "cc")
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
