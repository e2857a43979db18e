//! Automatic subtitle track selection.

use serde::{Deserialize, Serialize};

use crate::config::ExtractionSettings;
use crate::models::{languages_match, SubtitleTrack};

/// User preferences that drive track selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPreferences {
    /// Preferred language tag. Empty means no language preference.
    pub language: String,
    pub prefer_forced: bool,
    pub prefer_closed_caption: bool,
}

impl SelectionPreferences {
    pub fn from_settings(settings: &ExtractionSettings) -> Self {
        Self {
            language: settings.preferred_language.clone(),
            prefer_forced: settings.prefer_forced,
            prefer_closed_caption: settings.prefer_closed_caption,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    fn has_language(&self) -> bool {
        !self.language.trim().is_empty()
    }
}

/// Pick the best track, or `None` for an empty list.
///
/// Cascade, first match wins:
/// 1. with `prefer_closed_caption`, the first closed-caption track;
/// 2. with `prefer_forced`, the first forced track;
/// 3. the track with the highest codec priority, earliest on ties.
///
/// The cascade runs over tracks in the preferred language first, then
/// over all tracks. Pure and deterministic.
pub fn select_track<'a>(
    tracks: &'a [SubtitleTrack],
    prefs: &SelectionPreferences,
) -> Option<&'a SubtitleTrack> {
    if tracks.is_empty() {
        return None;
    }

    if prefs.has_language() {
        let in_language: Vec<&SubtitleTrack> = tracks
            .iter()
            .filter(|t| languages_match(t.language(), &prefs.language))
            .collect();
        if let Some(track) = cascade(&in_language, prefs) {
            return Some(track);
        }
    }

    let all: Vec<&SubtitleTrack> = tracks.iter().collect();
    cascade(&all, prefs).or_else(|| tracks.first())
}

fn cascade<'a>(candidates: &[&'a SubtitleTrack], prefs: &SelectionPreferences) -> Option<&'a SubtitleTrack> {
    if prefs.prefer_closed_caption {
        if let Some(track) = candidates.iter().copied().find(|t| t.kind().is_closed_caption()) {
            return Some(track);
        }
    }

    if prefs.prefer_forced {
        if let Some(track) = candidates.iter().copied().find(|t| t.kind().is_forced()) {
            return Some(track);
        }
    }

    let mut best: Option<&'a SubtitleTrack> = None;
    for &track in candidates {
        match best {
            Some(current) if current.priority() >= track.priority() => {}
            _ => best = Some(track),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SubtitleCodec, TrackKind};

    fn track(id: usize, codec: &str, lang: &str) -> SubtitleTrack {
        SubtitleTrack::builder(id, id + 1, codec).language(lang).build()
    }

    fn prefs(language: &str, forced: bool, cc: bool) -> SelectionPreferences {
        SelectionPreferences {
            language: language.to_string(),
            prefer_forced: forced,
            prefer_closed_caption: cc,
        }
    }

    fn mixed() -> Vec<SubtitleTrack> {
        vec![
            track(1, "S_HDMV/PGS", "eng"),
            SubtitleTrack::builder(2, 3, "S_TEXT/UTF8")
                .language("eng")
                .forced(true)
                .build(),
            SubtitleTrack::builder(3, 4, "S_TEXT/ASS")
                .language("en")
                .closed_caption(true)
                .build(),
            track(4, "S_TEXT/UTF8", "en-US"),
            track(5, "S_TEXT/UTF8", "ger"),
        ]
    }

    #[test]
    fn empty_list_selects_nothing() {
        assert!(select_track(&[], &prefs("eng", true, true)).is_none());
    }

    #[test]
    fn closed_caption_preference_wins() {
        let tracks = mixed();
        let chosen = select_track(&tracks, &prefs("eng", true, true)).unwrap();
        assert_eq!(chosen.id(), 3);
        assert!(chosen.kind().is_closed_caption());
    }

    #[test]
    fn forced_preference() {
        let tracks = mixed();
        let chosen = select_track(&tracks, &prefs("eng", true, false)).unwrap();
        assert_eq!(chosen.id(), 2);
        assert_eq!(chosen.kind(), TrackKind::Forced);
    }

    #[test]
    fn forced_is_tried_when_no_closed_caption_exists() {
        let tracks = vec![
            track(1, "S_TEXT/UTF8", "eng"),
            SubtitleTrack::builder(2, 3, "S_HDMV/PGS")
                .language("eng")
                .forced(true)
                .build(),
        ];
        let chosen = select_track(&tracks, &prefs("eng", true, true)).unwrap();
        assert_eq!(chosen.id(), 2);
    }

    #[test]
    fn fallback_prefers_codec_priority_then_order() {
        let tracks = mixed();
        let chosen = select_track(&tracks, &prefs("eng", false, false)).unwrap();
        // Tracks 2 and 4 are both SRT; the earlier one wins.
        assert_eq!(chosen.id(), 2);
        assert_eq!(chosen.codec(), SubtitleCodec::Srt);

        let images_first = vec![
            track(1, "S_HDMV/PGS", "eng"),
            track(2, "S_TEXT/WEBVTT", "eng"),
            track(3, "S_TEXT/ASS", "eng"),
        ];
        assert_eq!(select_track(&images_first, &prefs("eng", false, false)).unwrap().id(), 2);
    }

    #[test]
    fn language_variants_match() {
        let tracks = vec![track(1, "S_TEXT/UTF8", "fre"), track(2, "S_HDMV/PGS", "de")];
        assert_eq!(select_track(&tracks, &prefs("deu", false, false)).unwrap().id(), 2);
        assert_eq!(select_track(&tracks, &prefs("ger", false, false)).unwrap().id(), 2);
    }

    #[test]
    fn missing_language_falls_back_to_all_tracks() {
        let tracks = vec![
            track(1, "S_HDMV/PGS", "jpn"),
            SubtitleTrack::builder(2, 3, "S_TEXT/UTF8")
                .language("ger")
                .forced(true)
                .build(),
        ];
        let chosen = select_track(&tracks, &prefs("eng", true, false)).unwrap();
        assert_eq!(chosen.id(), 2);

        let chosen = select_track(&tracks, &prefs("eng", false, false)).unwrap();
        assert_eq!(chosen.id(), 2);
    }

    #[test]
    fn empty_language_skips_language_pass() {
        let tracks = vec![track(1, "S_HDMV/PGS", "eng"), track(2, "S_TEXT/UTF8", "jpn")];
        assert_eq!(select_track(&tracks, &prefs("", false, false)).unwrap().id(), 2);
    }

    #[test]
    fn unknown_codecs_still_select_first_track() {
        let tracks = vec![track(1, "S_WEIRD", "eng"), track(2, "S_WEIRD", "eng")];
        assert_eq!(select_track(&tracks, &prefs("eng", true, true)).unwrap().id(), 1);
    }

    #[test]
    fn selection_is_deterministic() {
        let tracks = mixed();
        for p in [
            prefs("eng", false, false),
            prefs("eng", true, false),
            prefs("eng", false, true),
            prefs("spa", true, true),
            prefs("", false, false),
        ] {
            let first = select_track(&tracks, &p).map(SubtitleTrack::id);
            for _ in 0..10 {
                assert_eq!(select_track(&tracks, &p).map(SubtitleTrack::id), first);
            }
        }
    }

    #[test]
    fn satisfiable_preferences_are_honoured() {
        let tracks = mixed();
        let chosen = select_track(&tracks, &prefs("eng", false, true)).unwrap();
        assert!(chosen.kind().is_closed_caption());
        assert!(languages_match(chosen.language(), "eng"));

        let chosen = select_track(&tracks, &prefs("en", true, false)).unwrap();
        assert!(chosen.kind().is_forced());
        assert!(languages_match(chosen.language(), "eng"));
    }

    #[test]
    fn from_settings_copies_preferences() {
        let settings = ExtractionSettings {
            preferred_language: "spa".to_string(),
            prefer_forced: true,
            ..ExtractionSettings::default()
        };
        let p = SelectionPreferences::from_settings(&settings);
        assert_eq!(p.language, "spa");
        assert!(p.prefer_forced);
        assert!(!p.prefer_closed_caption);
    }
}
