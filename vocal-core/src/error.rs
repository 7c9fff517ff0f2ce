//! Error types for note label parsing.

use thiserror::Error;

/// Returned when a textual note label such as `"C#4"` cannot be parsed.
///
/// Parsing is the only fallible operation in this crate. Pitch detection and
/// range tracking express "nothing to report" with `Option` or a neutral
/// result instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("empty note label")]
    Empty,

    #[error("unknown pitch class: {0:?}")]
    UnknownPitchClass(String),

    #[error("missing octave in note label: {0:?}")]
    MissingOctave(String),

    #[error("invalid octave {octave:?} in note label (expected {min}..={max})")]
    InvalidOctave { octave: String, min: i32, max: i32 },
}
