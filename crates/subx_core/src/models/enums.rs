//! Core enums used throughout the application.

use serde::{Deserialize, Serialize};

/// Encoding classification of a subtitle stream.
///
/// Computed once from the raw codec string when a track is built and
/// stored as a plain value. Drives the extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleCodec {
    /// SubRip text.
    Srt,
    /// SubStation Alpha / Advanced SubStation Alpha.
    Ass,
    /// WebVTT text.
    WebVtt,
    /// Universal Subtitle Format (XML).
    Usf,
    /// Timed Text Markup Language (XML).
    Ttml,
    /// Any other text-based format (Kate, mov_text, ...).
    GenericText,
    /// Blu-ray Presentation Graphic Stream bitmaps.
    Pgs,
    /// DVD VobSub bitmaps.
    VobSub,
    /// DVB bitmap subtitles.
    Dvb,
    /// Codec the pipeline has no mapping for.
    Unknown,
}

impl SubtitleCodec {
    /// Classify a raw codec string.
    ///
    /// Accepts Matroska codec ids (`S_TEXT/UTF8`, `S_HDMV/PGS`, ...) as
    /// reported by mkvmerge, and ffprobe codec names (`subrip`,
    /// `hdmv_pgs_subtitle`, ...). Matching is case-insensitive.
    pub fn classify(raw: &str) -> Self {
        let codec = raw.trim().to_ascii_uppercase();
        match codec.as_str() {
            "S_TEXT/UTF8" | "S_TEXT/ASCII" | "SUBRIP" | "SRT" => Self::Srt,
            "S_TEXT/ASS" | "S_TEXT/SSA" | "S_ASS" | "S_SSA" | "ASS" | "SSA" => Self::Ass,
            "S_TEXT/WEBVTT" | "D_WEBVTT/SUBTITLES" | "WEBVTT" => Self::WebVtt,
            "S_HDMV/PGS" | "HDMV_PGS_SUBTITLE" | "PGSSUB" => Self::Pgs,
            "S_VOBSUB" | "DVD_SUBTITLE" | "DVDSUB" => Self::VobSub,
            "S_DVBSUB" | "DVB_SUBTITLE" | "DVBSUB" => Self::Dvb,
            "S_TEXT/USF" | "USF" => Self::Usf,
            "S_TEXT/TTML" | "TTML" => Self::Ttml,
            "S_KATE" | "MOV_TEXT" | "TEXT" | "MICRODVD" | "SAMI" => Self::GenericText,
            other if other.starts_with("S_TEXT/") => Self::GenericText,
            _ => Self::Unknown,
        }
    }

    /// Whether the stream carries text that can be copied directly.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Self::Srt | Self::Ass | Self::WebVtt | Self::Usf | Self::Ttml | Self::GenericText
        )
    }

    /// XML-based text formats. Line-based correction would break them.
    pub fn is_markup(&self) -> bool {
        matches!(self, Self::Usf | Self::Ttml)
    }

    /// Whether the stream carries rendered bitmaps.
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Pgs | Self::VobSub | Self::Dvb)
    }

    /// Ranking used for auto-selection: exact SRT text, then other text,
    /// then image-based formats.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Srt => 3,
            Self::Ass | Self::WebVtt | Self::Usf | Self::Ttml | Self::GenericText => 2,
            Self::Pgs | Self::VobSub | Self::Dvb => 1,
            Self::Unknown => 0,
        }
    }

    /// File extension for the stream as written by the extractor.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::Ass => "ass",
            Self::WebVtt => "vtt",
            Self::Usf => "usf",
            Self::Ttml => "ttml",
            Self::GenericText => "txt",
            Self::Pgs => "sup",
            Self::VobSub => "sub",
            Self::Dvb => "dvbsub",
            Self::Unknown => "bin",
        }
    }

    /// Short display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Srt => "SRT",
            Self::Ass => "ASS",
            Self::WebVtt => "WebVTT",
            Self::Usf => "USF",
            Self::Ttml => "TTML",
            Self::GenericText => "Text",
            Self::Pgs => "PGS",
            Self::VobSub => "VobSub",
            Self::Dvb => "DVB",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for SubtitleCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Track classification derived from the forced / closed-caption flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    /// Regular full-dialogue track.
    Full,
    /// Forced track (foreign-language parts only).
    Forced,
    /// SDH / closed-caption track.
    ClosedCaption,
    /// Forced track that is also flagged as closed caption.
    ClosedCaptionForced,
}

impl TrackKind {
    /// Derive the kind from the two flags.
    pub fn from_flags(forced: bool, closed_caption: bool) -> Self {
        match (forced, closed_caption) {
            (false, false) => Self::Full,
            (true, false) => Self::Forced,
            (false, true) => Self::ClosedCaption,
            (true, true) => Self::ClosedCaptionForced,
        }
    }

    /// Whether this kind satisfies a "prefer forced" request.
    pub fn is_forced(&self) -> bool {
        matches!(self, Self::Forced | Self::ClosedCaptionForced)
    }

    /// Whether this kind satisfies a "prefer closed caption" request.
    pub fn is_closed_caption(&self) -> bool {
        matches!(self, Self::ClosedCaption | Self::ClosedCaptionForced)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "Full",
            Self::Forced => "Forced",
            Self::ClosedCaption => "CC",
            Self::ClosedCaptionForced => "CC Forced",
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How aggressively the correction engine rewrites OCR output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionLevel {
    /// Content is returned unchanged.
    Off,
    /// Exactly one pass over the rule table.
    #[default]
    Standard,
    /// Repeated passes until the text stops changing or the pass cap is hit.
    Thorough,
}

impl CorrectionLevel {
    /// Get the display name for this level.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Standard => "Standard (single pass)",
            Self::Thorough => "Thorough (multiple passes)",
        }
    }

    /// Get all available levels.
    pub fn all() -> &'static [CorrectionLevel] {
        &[Self::Off, Self::Standard, Self::Thorough]
    }

    /// Parse a level from its lowercase identifier.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Some(Self::Off),
            "standard" | "single" => Some(Self::Standard),
            "thorough" | "multi" => Some(Self::Thorough),
            _ => None,
        }
    }

    /// Whether any correction happens at this level.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Off)
    }
}

impl std::fmt::Display for CorrectionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Where a source file lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLocation {
    #[default]
    Local,
    Network,
}

impl SourceLocation {
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network)
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Network => write!(f, "network"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_matroska_codec_ids() {
        assert_eq!(SubtitleCodec::classify("S_TEXT/UTF8"), SubtitleCodec::Srt);
        assert_eq!(SubtitleCodec::classify("S_TEXT/ASS"), SubtitleCodec::Ass);
        assert_eq!(SubtitleCodec::classify("S_TEXT/WEBVTT"), SubtitleCodec::WebVtt);
        assert_eq!(SubtitleCodec::classify("S_HDMV/PGS"), SubtitleCodec::Pgs);
        assert_eq!(SubtitleCodec::classify("S_VOBSUB"), SubtitleCodec::VobSub);
        assert_eq!(SubtitleCodec::classify("S_DVBSUB"), SubtitleCodec::Dvb);
        assert_eq!(SubtitleCodec::classify("S_TEXT/USF"), SubtitleCodec::Usf);
        assert_eq!(SubtitleCodec::classify("ttml"), SubtitleCodec::Ttml);
        assert_eq!(SubtitleCodec::classify("S_TEXT/SOMETHING"), SubtitleCodec::GenericText);
    }

    #[test]
    fn classifies_ffprobe_names() {
        assert_eq!(SubtitleCodec::classify("subrip"), SubtitleCodec::Srt);
        assert_eq!(SubtitleCodec::classify("hdmv_pgs_subtitle"), SubtitleCodec::Pgs);
        assert_eq!(SubtitleCodec::classify("dvd_subtitle"), SubtitleCodec::VobSub);
        assert_eq!(SubtitleCodec::classify("mov_text"), SubtitleCodec::GenericText);
        assert_eq!(SubtitleCodec::classify("eia_608"), SubtitleCodec::Unknown);
    }

    #[test]
    fn xml_formats_keep_their_own_extension() {
        assert_eq!(SubtitleCodec::Usf.extension(), "usf");
        assert_eq!(SubtitleCodec::Ttml.extension(), "ttml");
        assert_eq!(SubtitleCodec::GenericText.extension(), "txt");
        assert!(SubtitleCodec::Usf.is_markup() && SubtitleCodec::Ttml.is_markup());
        assert!(!SubtitleCodec::Srt.is_markup() && !SubtitleCodec::GenericText.is_markup());
        assert!(SubtitleCodec::Usf.is_text());
    }

    #[test]
    fn codec_priority_orders_text_before_image() {
        assert!(SubtitleCodec::Srt.priority() > SubtitleCodec::Ass.priority());
        assert!(SubtitleCodec::WebVtt.priority() > SubtitleCodec::Pgs.priority());
        assert!(SubtitleCodec::Dvb.priority() > SubtitleCodec::Unknown.priority());
    }

    #[test]
    fn track_kind_from_flags() {
        assert_eq!(TrackKind::from_flags(false, false), TrackKind::Full);
        assert_eq!(TrackKind::from_flags(true, true), TrackKind::ClosedCaptionForced);
        assert!(TrackKind::ClosedCaptionForced.is_forced());
        assert!(TrackKind::ClosedCaptionForced.is_closed_caption());
        assert!(!TrackKind::Forced.is_closed_caption());
    }

    #[test]
    fn correction_level_serializes_lowercase() {
        let json = serde_json::to_string(&CorrectionLevel::Thorough).unwrap();
        assert_eq!(json, "\"thorough\"");
        assert_eq!(CorrectionLevel::parse("OFF"), Some(CorrectionLevel::Off));
        assert_eq!(CorrectionLevel::parse("bogus"), None);
    }
}
