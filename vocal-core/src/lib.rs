// vocal-core/src/lib.rs

//! The core logic for the vocal range finder.
//! This crate is responsible for pitch detection, note mapping, range
//! tracking and voice classification. It is completely headless and
//! performs no audio capture, persistence or rendering.

pub mod confidence;
pub mod error;
pub mod note;
pub mod pitch;
pub mod range;
pub mod root_note;
pub mod session;

pub use error::FormatError;
pub use note::{NoteLabel, PitchClass, frequency_to_note, note_to_frequency};
pub use pitch::{AudioFrame, DetectorConfig, PitchDetector, PitchEstimate};
pub use range::{
    PushOutcome, RangeSample, RangeTracker, TrackerConfig, VocalRangeResult, VoiceType,
    calculate_vocal_range,
};
pub use root_note::calculate_optimal_root_note;
pub use session::{RangeObserver, RangeSession, SessionConfig, SessionEvent};
