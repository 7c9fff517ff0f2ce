//! # Vocal Range Module
//!
//! Tracks a singer's lowest and highest stable pitches over a session and
//! classifies the resulting range.
//!
//! ## Snapshots and running extrema
//! The tracker keeps two views of the session:
//! - a bounded rolling buffer of the most recent accepted frequencies, from
//!   which every [`VocalRangeResult`] snapshot is recomputed
//! - running minimum and maximum over every accepted frequency since
//!   [`RangeTracker::start`], never reset by buffer eviction
//!
//! Snapshots are the session result. The running extrema exist for progress
//! display only and can be wider than the latest snapshot once the buffer has
//! started evicting.

use crate::note::{self, A4_FREQUENCY, NoteLabel};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Coarse voice classification derived from range extremes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VoiceType {
    Soprano,
    MezzoSoprano,
    Alto,
    Tenor,
    Baritone,
    Bass,
    Unknown,
}

impl VoiceType {
    pub fn name(self) -> &'static str {
        match self {
            VoiceType::Soprano => "soprano",
            VoiceType::MezzoSoprano => "mezzo-soprano",
            VoiceType::Alto => "alto",
            VoiceType::Tenor => "tenor",
            VoiceType::Baritone => "baritone",
            VoiceType::Bass => "bass",
            VoiceType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for VoiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `(voice type, minimum low Hz, minimum high Hz)`, checked in order.
const VOICE_RULES: [(VoiceType, f32, f32); 6] = [
    (VoiceType::Soprano, 250.0, 1000.0),
    (VoiceType::MezzoSoprano, 200.0, 850.0),
    (VoiceType::Alto, 170.0, 650.0),
    (VoiceType::Tenor, 120.0, 500.0),
    (VoiceType::Baritone, 90.0, 380.0),
    (VoiceType::Bass, 80.0, 320.0),
];

/// Classifies a range. The first rule whose low and high thresholds are both
/// met wins, so a wide soprano range is never reported as a lower voice.
pub fn classify_voice(low_hz: f32, high_hz: f32) -> VoiceType {
    VOICE_RULES
        .iter()
        .find(|(_, min_low, min_high)| low_hz >= *min_low && high_hz >= *min_high)
        .map(|(voice, _, _)| *voice)
        .unwrap_or(VoiceType::Unknown)
}

/// Immutable summary of a range. Replaced, never mutated, as tracking
/// continues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocalRangeResult {
    pub lowest_note: NoteLabel,
    pub highest_note: NoteLabel,
    pub lowest_frequency_hz: f32,
    pub highest_frequency_hz: f32,
    /// `round(12 * log2(high / low))`
    pub range_semitones: i32,
    pub voice_type: VoiceType,
}

impl VocalRangeResult {
    /// Result reported when there is nothing to summarise: a zero-width range
    /// on A4.
    pub fn neutral() -> Self {
        let reference = note::frequency_to_note(A4_FREQUENCY);
        Self {
            lowest_note: reference,
            highest_note: reference,
            lowest_frequency_hz: A4_FREQUENCY,
            highest_frequency_hz: A4_FREQUENCY,
            range_semitones: 0,
            voice_type: VoiceType::Unknown,
        }
    }

    fn from_extremes(low: f32, high: f32) -> Self {
        Self {
            lowest_note: note::frequency_to_note(low),
            highest_note: note::frequency_to_note(high),
            lowest_frequency_hz: low,
            highest_frequency_hz: high,
            range_semitones: (12.0 * (high / low).log2()).round() as i32,
            voice_type: classify_voice(low, high),
        }
    }
}

/// Summarises a set of frequencies.
///
/// Non-positive and non-finite values are skipped. When nothing usable remains
/// the neutral result is returned.
pub fn calculate_vocal_range(frequencies: &[f32]) -> VocalRangeResult {
    let (low, high) = frequencies
        .iter()
        .copied()
        .filter(|f| f.is_finite() && *f > 0.0)
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(low, high), f| {
            (low.min(f), high.max(f))
        });

    if low > high {
        return VocalRangeResult::neutral();
    }
    VocalRangeResult::from_extremes(low, high)
}

/// Tunables for [`RangeTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Samples must score strictly above this to be accepted.
    pub acceptance_threshold: f32,
    /// Capacity of the rolling buffer.
    pub buffer_capacity: usize,
    /// A snapshot is emitted every this many accepted samples.
    pub snapshot_interval: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.8,
            buffer_capacity: 100,
            snapshot_interval: 10,
        }
    }
}

/// A scored pitch offered to the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeSample {
    pub frequency_hz: f32,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Tracking,
}

/// What happened to a sample passed to [`RangeTracker::push`].
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    /// The tracker is idle; the sample was ignored.
    Idle,
    /// Confidence too low or frequency unusable; state unchanged.
    Discarded,
    /// Added to the buffer and running extrema.
    Accepted,
    /// Added, and the accepted count reached a multiple of the snapshot
    /// interval.
    Snapshot(VocalRangeResult),
}

/// Streaming range tracker with an Idle -> Tracking -> Idle lifecycle.
///
/// All mutable state lives in this struct. Concurrent sessions each need their
/// own instance.
#[derive(Debug, Clone)]
pub struct RangeTracker {
    config: TrackerConfig,
    state: TrackerState,
    buffer: VecDeque<f32>,
    stable_reading_count: usize,
    running_min: f32,
    running_max: f32,
    last_snapshot: Option<VocalRangeResult>,
}

impl Default for RangeTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl RangeTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let config = TrackerConfig {
            buffer_capacity: config.buffer_capacity.max(1),
            snapshot_interval: config.snapshot_interval.max(1),
            ..config
        };
        Self {
            config,
            state: TrackerState::Idle,
            buffer: VecDeque::with_capacity(config.buffer_capacity),
            stable_reading_count: 0,
            running_min: f32::INFINITY,
            running_max: f32::NEG_INFINITY,
            last_snapshot: None,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state == TrackerState::Tracking
    }

    /// Begins a new session, discarding everything from the previous one.
    pub fn start(&mut self) {
        self.buffer.clear();
        self.stable_reading_count = 0;
        self.running_min = f32::INFINITY;
        self.running_max = f32::NEG_INFINITY;
        self.last_snapshot = None;
        self.state = TrackerState::Tracking;
        log::debug!("range tracking started");
    }

    /// Ends the session and returns its result: the last snapshot emitted.
    ///
    /// No final recompute happens here, so a session stopped before its first
    /// snapshot returns `None`. The tracker has no timeout of its own; only
    /// this call ends tracking.
    pub fn stop(&mut self) -> Option<VocalRangeResult> {
        if self.state == TrackerState::Tracking {
            log::debug!(
                "range tracking stopped after {} stable readings",
                self.stable_reading_count
            );
        }
        self.state = TrackerState::Idle;
        self.last_snapshot.clone()
    }

    /// Offers one scored pitch to the tracker.
    pub fn push(&mut self, sample: RangeSample) -> PushOutcome {
        if self.state != TrackerState::Tracking {
            return PushOutcome::Idle;
        }
        let frequency = sample.frequency_hz;
        if !(sample.confidence > self.config.acceptance_threshold)
            || !frequency.is_finite()
            || frequency <= 0.0
        {
            log::trace!(
                "discarded {:.1} Hz at confidence {:.2}",
                frequency,
                sample.confidence
            );
            return PushOutcome::Discarded;
        }

        if self.buffer.len() == self.config.buffer_capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(frequency);
        self.running_min = self.running_min.min(frequency);
        self.running_max = self.running_max.max(frequency);
        self.stable_reading_count += 1;

        if self.stable_reading_count % self.config.snapshot_interval == 0 {
            let snapshot = self.current_snapshot();
            log::debug!(
                "snapshot #{}: {}-{} ({} semitones, {})",
                self.stable_reading_count / self.config.snapshot_interval,
                snapshot.lowest_note,
                snapshot.highest_note,
                snapshot.range_semitones,
                snapshot.voice_type
            );
            self.last_snapshot = Some(snapshot.clone());
            PushOutcome::Snapshot(snapshot)
        } else {
            PushOutcome::Accepted
        }
    }

    /// Recomputes a result from the rolling buffer as it stands now.
    pub fn current_snapshot(&self) -> VocalRangeResult {
        let frequencies: Vec<f32> = self.buffer.iter().copied().collect();
        calculate_vocal_range(&frequencies)
    }

    /// The last snapshot emitted in this session.
    pub fn last_snapshot(&self) -> Option<&VocalRangeResult> {
        self.last_snapshot.as_ref()
    }

    /// Session-wide `(min, max)` of accepted frequencies, for progress display.
    pub fn running_extrema(&self) -> Option<(f32, f32)> {
        (self.stable_reading_count > 0).then_some((self.running_min, self.running_max))
    }

    pub fn stable_reading_count(&self) -> usize {
        self.stable_reading_count
    }

    /// Frequencies currently in the rolling buffer, oldest first.
    pub fn buffered(&self) -> impl Iterator<Item = f32> + '_ {
        self.buffer.iter().copied()
    }
}
