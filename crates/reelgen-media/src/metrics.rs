//! Metric names and recording helpers for the degraded paths.
//!
//! Only the `metrics` facade is used here; installing a recorder is left to
//! the embedding process. Without one these calls are no-ops.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const AVATAR_UNAVAILABLE_TOTAL: &str = "reelgen_avatar_unavailable_total";
    pub const GLYPH_UNAVAILABLE_TOTAL: &str = "reelgen_glyph_unavailable_total";
    pub const GLYPH_CACHE_HITS_TOTAL: &str = "reelgen_glyph_cache_hits_total";
    pub const DEGRADED_ENCODES_TOTAL: &str = "reelgen_degraded_encodes_total";
    pub const COMPOSE_DURATION_SECONDS: &str = "reelgen_compose_duration_seconds";
}

/// Record an avatar that could not be prepared.
pub fn record_avatar_unavailable(reason: &'static str) {
    counter!(names::AVATAR_UNAVAILABLE_TOTAL, "reason" => reason).increment(1);
}

/// Record an emoji that fell back to the font glyph.
pub fn record_glyph_unavailable() {
    counter!(names::GLYPH_UNAVAILABLE_TOTAL).increment(1);
}

/// Record an emoji served from the shared cache.
pub fn record_glyph_cache_hit() {
    counter!(names::GLYPH_CACHE_HITS_TOTAL).increment(1);
}

/// Record an encode that completed without audio after an encoder failure.
pub fn record_degraded_encode() {
    counter!(names::DEGRADED_ENCODES_TOTAL).increment(1);
}

/// Record total compose wall time.
pub fn record_compose_duration(duration_secs: f64, degraded: bool) {
    let labels = [("degraded", degraded.to_string())];
    histogram!(names::COMPOSE_DURATION_SECONDS, &labels).record(duration_secs);
}
