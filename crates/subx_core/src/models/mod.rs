//! Data models for SubX.
//!
//! This module contains the core data structures shared by the pipeline:
//! - Enums for codec classification, track kind, correction level
//! - The immutable subtitle track record
//! - Language tag normalisation

mod enums;
mod language;
mod media;

// Re-export all public types
pub use enums::{CorrectionLevel, SourceLocation, SubtitleCodec, TrackKind};
pub use language::{languages_match, normalize_language, two_letter_code, UNDETERMINED};
pub use media::{SubtitleTrack, SubtitleTrackBuilder, TrackFlags};
