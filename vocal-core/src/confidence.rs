//! Heuristic confidence for a detected frequency.
//!
//! This is a coarse lookup on where the frequency falls relative to the
//! typical singing band, not a statistical measure of detection quality.

/// Score for frequencies outside 80-1100 Hz. The detector never reports these.
pub const INVALID: f32 = 0.0;
/// Score near the edges of the voice band: 80-100 Hz and 800-1100 Hz.
pub const EDGE_OF_BAND: f32 = 0.3;
/// Score inside the typical voice band, 100-800 Hz.
pub const TYPICAL_BAND: f32 = 0.9;
/// Score for anything the bands above do not claim.
pub const FALLBACK: f32 = 0.7;

/// Scores `frequency_hz` in [0, 1].
pub fn estimate(frequency_hz: f32) -> f32 {
    if frequency_hz < 80.0 || frequency_hz > 1100.0 {
        INVALID
    } else if (100.0..=800.0).contains(&frequency_hz) {
        TYPICAL_BAND
    } else if (80.0..100.0).contains(&frequency_hz)
        || (frequency_hz > 800.0 && frequency_hz <= 1100.0)
    {
        EDGE_OF_BAND
    } else {
        FALLBACK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The bands are a fixed lookup table; these tests pin the table, not any
    // notion of accuracy.

    #[test]
    fn typical_band_scores_high() {
        for freq in [100.0, 220.0, 440.0, 800.0] {
            assert_eq!(estimate(freq), TYPICAL_BAND, "{freq}");
        }
    }

    #[test]
    fn band_edges_score_low() {
        for freq in [80.0, 99.9, 800.1, 1000.0, 1100.0] {
            assert_eq!(estimate(freq), EDGE_OF_BAND, "{freq}");
        }
    }

    #[test]
    fn out_of_band_is_invalid() {
        for freq in [0.0, 79.9, 1100.1, 5000.0] {
            assert_eq!(estimate(freq), INVALID, "{freq}");
        }
    }

    #[test]
    fn nan_falls_through_to_fallback() {
        assert_eq!(estimate(f32::NAN), FALLBACK);
    }

    #[test]
    fn only_typical_band_clears_tracker_threshold() {
        assert!(estimate(440.0) > 0.8);
        assert!(estimate(90.0) <= 0.8);
        assert!(estimate(900.0) <= 0.8);
    }
}
