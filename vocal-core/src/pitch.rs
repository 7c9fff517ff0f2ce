//! # Pitch Detection Module
//!
//! Estimates the fundamental frequency of one frame of a monophonic singing
//! voice using autocorrelation over the lag range of the human voice.
//!
//! ## Features
//! - RMS noise gate to reject silence
//! - Lag search restricted to the configured voice band (80-1100 Hz by default)
//! - Correlation-strength gate to reject frames without clear periodicity
//!
//! There is no octave-error correction pass. A strong sub-harmonic or overtone
//! peak can win over the true fundamental.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One frame of normalized samples borrowed from the caller for the duration of
/// a single detection call.
#[derive(Debug, Clone, Copy)]
pub struct AudioFrame<'a> {
    pub samples: &'a [f32],
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
}

impl<'a> AudioFrame<'a> {
    pub fn new(samples: &'a [f32], sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }
}

/// Result of analysing a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchEstimate {
    /// Detected frequency in Hz, `None` for silence or no clear pitch.
    pub frequency_hz: Option<f32>,
    /// Position of the frame within the caller's stream.
    pub timestamp: Duration,
}

/// Tunable thresholds for [`PitchDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum RMS amplitude for a frame to be analysed.
    pub silence_threshold: f32,
    /// Minimum normalized autocorrelation at the chosen lag.
    pub correlation_threshold: f32,
    pub min_frequency_hz: f32,
    pub max_frequency_hz: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 0.01,
            correlation_threshold: 0.3,
            min_frequency_hz: 80.0,
            max_frequency_hz: 1100.0,
        }
    }
}

/// Autocorrelation pitch detector. Stateless apart from its configuration, so
/// one instance can serve any number of frames.
#[derive(Debug, Clone, Default)]
pub struct PitchDetector {
    config: DetectorConfig,
}

impl PitchDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detects the fundamental frequency of one frame.
    ///
    /// # Arguments
    /// * `frame` - Samples in [-1, 1] and their sample rate
    ///
    /// # Returns
    /// * `Some(frequency)` - Detected frequency in Hz, always within the
    ///   configured voice band
    /// * `None` - Silence, no clear periodicity, or a frame too short for the
    ///   lag range
    pub fn detect(&self, frame: AudioFrame<'_>) -> Option<f32> {
        let signal = frame.samples;
        let config = &self.config;
        if signal.is_empty() || frame.sample_rate == 0 {
            return None;
        }
        if config.min_frequency_hz <= 0.0 || config.max_frequency_hz <= config.min_frequency_hz {
            return None;
        }

        // --- Noise gate ---
        let energy: f32 = signal.iter().map(|&s| s * s).sum();
        let rms = (energy / signal.len() as f32).sqrt();
        if rms < config.silence_threshold || energy <= 0.0 {
            return None;
        }

        // --- Lag range for the voice band ---
        let sample_rate = frame.sample_rate as f32;
        let min_lag = ((sample_rate / config.max_frequency_hz).floor() as usize).max(1);
        let max_lag =
            ((sample_rate / config.min_frequency_hz).floor() as usize).min(signal.len() - 1);
        if min_lag > max_lag {
            return None;
        }

        // --- Autocorrelation peak ---
        // r[lag] is scaled by r[0] so the strength gate does not depend on
        // frame length or loudness.
        let mut best_lag = 0;
        let mut best_correlation = f32::NEG_INFINITY;
        for lag in min_lag..=max_lag {
            let correlation = autocorrelation(signal, lag) / energy;
            if correlation > best_correlation {
                best_correlation = correlation;
                best_lag = lag;
            }
        }

        if best_lag == 0 || best_correlation < config.correlation_threshold {
            log::trace!("no periodicity: best r = {best_correlation:.3} at lag {best_lag}");
            return None;
        }

        let frequency = sample_rate / best_lag as f32;
        if frequency.is_finite()
            && frequency >= config.min_frequency_hz
            && frequency <= config.max_frequency_hz
        {
            Some(frequency)
        } else {
            None
        }
    }

    /// Runs [`detect`](Self::detect) and stamps the result.
    pub fn estimate(&self, frame: AudioFrame<'_>, timestamp: Duration) -> PitchEstimate {
        PitchEstimate {
            frequency_hz: self.detect(frame),
            timestamp,
        }
    }
}

/// Unnormalized autocorrelation `sum(x[i] * x[i + lag])`.
fn autocorrelation(signal: &[f32], lag: usize) -> f32 {
    signal
        .iter()
        .zip(&signal[lag..])
        .map(|(a, b)| a * b)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sine(freq: f32, sample_rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32;
                amplitude * phase.sin()
            })
            .collect()
    }

    #[test]
    fn detects_220hz_sine() {
        let samples = sine(220.0, 44100, 4096, 0.5);
        let freq = PitchDetector::default()
            .detect(AudioFrame::new(&samples, 44100))
            .expect("pitch");
        assert_abs_diff_eq!(freq, 220.0, epsilon = 2.0);
    }

    #[test]
    fn detects_low_and_high_voice_notes() {
        let detector = PitchDetector::default();
        for target in [110.0f32, 330.0, 440.0] {
            let samples = sine(target, 44100, 4096, 0.3);
            let freq = detector.detect(AudioFrame::new(&samples, 44100)).expect("pitch");
            // Integer lags limit resolution to about 1% at these frequencies.
            assert_abs_diff_eq!(freq, target, epsilon = target * 0.01);
        }
    }

    #[test]
    fn near_silence_is_absent() {
        let samples = sine(220.0, 44100, 4096, 0.001);
        assert_eq!(PitchDetector::default().detect(AudioFrame::new(&samples, 44100)), None);

        let zeros = vec![0.0; 2048];
        assert_eq!(PitchDetector::default().detect(AudioFrame::new(&zeros, 44100)), None);
    }

    #[test]
    fn aperiodic_frame_is_absent() {
        // Deterministic white noise from a linear congruential generator.
        let mut state: u32 = 0x1234_5678;
        let samples: Vec<f32> = (0..4096)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5
            })
            .collect();
        assert_eq!(PitchDetector::default().detect(AudioFrame::new(&samples, 44100)), None);
    }

    #[test]
    fn degenerate_input_is_absent() {
        let detector = PitchDetector::default();
        assert_eq!(detector.detect(AudioFrame::new(&[], 44100)), None);
        let samples = sine(220.0, 44100, 4096, 0.5);
        assert_eq!(detector.detect(AudioFrame::new(&samples, 0)), None);
        // Too short to hold even the shortest lag.
        assert_eq!(detector.detect(AudioFrame::new(&samples[..20], 44100)), None);
    }

    #[test]
    fn estimate_carries_timestamp() {
        let samples = sine(220.0, 44100, 4096, 0.5);
        let at = Duration::from_millis(250);
        let estimate = PitchDetector::default().estimate(AudioFrame::new(&samples, 44100), at);
        assert_eq!(estimate.timestamp, at);
        assert!(estimate.frequency_hz.is_some());
    }
}
