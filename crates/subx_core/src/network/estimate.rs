//! Processing-time estimates.

use std::time::Duration;

use crate::config::NetworkSettings;
use crate::models::SourceLocation;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Rough processing time for a source of `size_bytes`.
///
/// `base + per_gib * size`, multiplied by the network multiplier for
/// remote sources. Negative or non-finite settings yield zero.
pub fn estimate_processing_time(size_bytes: u64, location: SourceLocation, settings: &NetworkSettings) -> Duration {
    let mut seconds = settings.base_seconds + settings.seconds_per_gib * (size_bytes as f64 / GIB);
    if location.is_network() {
        seconds *= settings.network_multiplier;
    }

    if seconds.is_finite() && seconds > 0.0 {
        Duration::from_secs_f64(seconds)
    } else {
        Duration::ZERO
    }
}
