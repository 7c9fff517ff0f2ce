//! # Note Mapping Module
//!
//! Converts between frequencies and equal-tempered note labels. All values are
//! referenced to A4 = 440 Hz and octaves follow scientific pitch notation, so
//! middle C is `C4`.
//!
//! ## Features
//! - Frequency to note label with the deviation from that note in cents
//! - Note label to frequency through a fixed octave-4 reference table
//! - Parsing and printing of labels such as `"C#4"` or `"Db3"`

use crate::error::FormatError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reference pitch for A4 in Hz.
pub const A4_FREQUENCY: f32 = 440.0;

/// Lowest octave accepted when parsing a label.
pub const MIN_OCTAVE: i32 = 0;
/// Highest octave accepted when parsing a label.
pub const MAX_OCTAVE: i32 = 8;

/// C0 sits 57 semitones (4.75 octaves) below A4.
fn c0_frequency() -> f64 {
    A4_FREQUENCY as f64 * 2f64.powf(-4.75)
}

const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// One of the twelve equal-tempered pitch classes, spelled with sharps and
/// ordered from C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    #[serde(rename = "C#")]
    CSharp,
    D,
    #[serde(rename = "D#")]
    DSharp,
    E,
    F,
    #[serde(rename = "F#")]
    FSharp,
    G,
    #[serde(rename = "G#")]
    GSharp,
    A,
    #[serde(rename = "A#")]
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Semitones above C (0..=11).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Pitch class for a semitone count above C; wraps modulo 12.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 12]
    }

    pub fn name(self) -> &'static str {
        PITCH_CLASS_NAMES[self.index()]
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses a letter plus optional accidental into a signed semitone offset
/// from C. `"Cb"` yields -1 and `"B#"` yields 12 so that callers can carry the
/// octave.
fn parse_semitone(s: &str) -> Result<i32, FormatError> {
    let mut chars = s.chars();
    let base = match chars.next().map(|c| c.to_ascii_uppercase()) {
        Some('C') => 0,
        Some('D') => 2,
        Some('E') => 4,
        Some('F') => 5,
        Some('G') => 7,
        Some('A') => 9,
        Some('B') => 11,
        Some(_) => return Err(FormatError::UnknownPitchClass(s.to_string())),
        None => return Err(FormatError::Empty),
    };
    match chars.as_str() {
        "" => Ok(base),
        "#" | "♯" => Ok(base + 1),
        "b" | "♭" => Ok(base - 1),
        _ => Err(FormatError::UnknownPitchClass(s.to_string())),
    }
}

impl FromStr for PitchClass {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let semitone = parse_semitone(s.trim())?;
        Ok(PitchClass::from_index(semitone.rem_euclid(12) as usize))
    }
}

/// Frequencies of every pitch class in octave 4, computed once.
static OCTAVE_FOUR: Lazy<[f32; 12]> = Lazy::new(|| {
    std::array::from_fn(|i| {
        // A is index 9 within the octave.
        (A4_FREQUENCY as f64 * 2f64.powf((i as f64 - 9.0) / 12.0)) as f32
    })
});

/// A note name with octave and the deviation, in cents, of the frequency it was
/// derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteLabel {
    pub pitch_class: PitchClass,
    pub octave: i32,
    /// Deviation in cents, within (-50, 50]. Zero for labels built by hand.
    pub cents_offset: i32,
}

impl NoteLabel {
    pub fn new(pitch_class: PitchClass, octave: i32) -> Self {
        Self {
            pitch_class,
            octave,
            cents_offset: 0,
        }
    }

    /// Equal-tempered frequency of the labelled note. `cents_offset` is ignored.
    pub fn frequency(&self) -> f32 {
        note_to_frequency(self.pitch_class, self.octave)
    }
}

impl fmt::Display for NoteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

impl FromStr for NoteLabel {
    type Err = FormatError;

    /// Parses `"A4"`, `"C#3"`, `"Db5"`. The octave is required and must lie in
    /// `MIN_OCTAVE..=MAX_OCTAVE`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(FormatError::Empty);
        }

        let split = s
            .find(|c: char| c.is_ascii_digit() || c == '-' || c == '+')
            .unwrap_or(s.len());
        let (name, octave_str) = s.split_at(split);
        if name.is_empty() {
            return Err(FormatError::UnknownPitchClass(s.to_string()));
        }
        let semitone = parse_semitone(name)?;
        if octave_str.is_empty() {
            return Err(FormatError::MissingOctave(s.to_string()));
        }

        let invalid_octave = || FormatError::InvalidOctave {
            octave: octave_str.to_string(),
            min: MIN_OCTAVE,
            max: MAX_OCTAVE,
        };
        let written: i32 = octave_str.parse().map_err(|_| invalid_octave())?;
        // Cb and B# cross the octave boundary.
        let octave = written + semitone.div_euclid(12);
        if !(MIN_OCTAVE..=MAX_OCTAVE).contains(&octave) {
            return Err(invalid_octave());
        }

        Ok(NoteLabel::new(
            PitchClass::from_index(semitone.rem_euclid(12) as usize),
            octave,
        ))
    }
}

/// Finds the nearest equal-tempered note to `freq`.
///
/// # Arguments
/// * `freq` - Frequency in Hz
///
/// # Returns
/// * The nearest note and the deviation from it in cents. Non-positive or
///   non-finite input returns `A4` with zero cents; this fallback carries no
///   information about the input.
pub fn frequency_to_note(freq: f32) -> NoteLabel {
    if !freq.is_finite() || freq <= 0.0 {
        return NoteLabel::new(PitchClass::A, 4);
    }

    let note_number = 12.0 * (freq as f64 / c0_frequency()).log2();
    let rounded = note_number.round();
    let mut cents_offset = ((note_number - rounded) * 100.0).round() as i32;
    let mut rounded = rounded as i32;
    // Keep cents within (-50, 50]: 50 flat is reported as 50 sharp of the
    // note below.
    if cents_offset == -50 {
        rounded -= 1;
        cents_offset = 50;
    }

    NoteLabel {
        pitch_class: PitchClass::from_index(rounded.rem_euclid(12) as usize),
        octave: rounded.div_euclid(12),
        cents_offset,
    }
}

/// Equal-tempered frequency of `pitch_class` in `octave`.
pub fn note_to_frequency(pitch_class: PitchClass, octave: i32) -> f32 {
    OCTAVE_FOUR[pitch_class.index()] * 2f32.powi(octave - 4)
}

/// Calculates the deviation of `freq` from `reference` in cents.
///
/// # Returns
/// * `Some(cents)` - positive when `freq` is sharp of `reference`
/// * `None` - either frequency is not strictly positive
pub fn cents_between(freq: f32, reference: f32) -> Option<f32> {
    if freq > 0.0 && reference > 0.0 {
        Some(1200.0 * (freq / reference).log2())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn concert_a_maps_to_a4() {
        let note = frequency_to_note(440.0);
        assert_eq!(note.pitch_class, PitchClass::A);
        assert_eq!(note.octave, 4);
        assert_eq!(note.cents_offset, 0);
    }

    #[test]
    fn round_trip_every_note() {
        for octave in MIN_OCTAVE..=MAX_OCTAVE {
            for pitch_class in PitchClass::ALL {
                let freq = note_to_frequency(pitch_class, octave);
                let note = frequency_to_note(freq);
                assert_eq!(note.pitch_class, pitch_class, "{pitch_class}{octave}");
                assert_eq!(note.octave, octave, "{pitch_class}{octave}");
                assert!(note.cents_offset.abs() <= 1, "{pitch_class}{octave}");
            }
        }
    }

    #[test]
    fn middle_c_is_octave_four() {
        assert_abs_diff_eq!(note_to_frequency(PitchClass::C, 4), 261.63, epsilon = 0.01);
        let note = frequency_to_note(261.63);
        assert_eq!(note.to_string(), "C4");
    }

    #[test]
    fn cents_reflect_detuning() {
        // A quarter tone above A4.
        let note = frequency_to_note(440.0 * 2f32.powf(0.25 / 12.0));
        assert_eq!(note.to_string(), "A4");
        assert_eq!(note.cents_offset, 25);

        let flat = frequency_to_note(440.0 * 2f32.powf(-0.3 / 12.0));
        assert_eq!(flat.to_string(), "A4");
        assert_eq!(flat.cents_offset, -30);
    }

    #[test]
    fn cents_never_reach_minus_fifty() {
        // 49.6 cents flat of A4 rounds to a half semitone.
        let note = frequency_to_note(440.0 * 2f32.powf(-49.6 / 1200.0));
        assert_eq!(note.to_string(), "G#4");
        assert_eq!(note.cents_offset, 50);

        // Crossing C moves the octave down as well.
        let c4 = note_to_frequency(PitchClass::C, 4);
        let below_c = frequency_to_note(c4 * 2f32.powf(-49.8 / 1200.0));
        assert_eq!(below_c.to_string(), "B3");
        assert_eq!(below_c.cents_offset, 50);

        for step in 0..2000 {
            let freq = 200.0 * 2f32.powf(step as f32 / 2000.0);
            let cents = frequency_to_note(freq).cents_offset;
            assert!(cents > -50 && cents <= 50, "{freq} Hz -> {cents}");
        }
    }

    #[test]
    fn low_frequencies_wrap_octave_below_c() {
        // B0 sits just below C1 and must not be reported as octave 1.
        let note = frequency_to_note(note_to_frequency(PitchClass::B, 0));
        assert_eq!(note.to_string(), "B0");
    }

    #[test]
    fn non_positive_frequency_falls_back_to_a4() {
        for freq in [0.0, -12.0, f32::NAN] {
            let note = frequency_to_note(freq);
            assert_eq!(note, NoteLabel::new(PitchClass::A, 4));
        }
    }

    #[test]
    fn parses_sharps_and_flats() {
        assert_eq!("C#4".parse::<NoteLabel>(), Ok(NoteLabel::new(PitchClass::CSharp, 4)));
        assert_eq!("Db4".parse::<NoteLabel>(), Ok(NoteLabel::new(PitchClass::CSharp, 4)));
        assert_eq!(" a3 ".parse::<NoteLabel>(), Ok(NoteLabel::new(PitchClass::A, 3)));
        assert_eq!("Cb4".parse::<NoteLabel>(), Ok(NoteLabel::new(PitchClass::B, 3)));
        assert_eq!("B#4".parse::<NoteLabel>(), Ok(NoteLabel::new(PitchClass::C, 5)));
        assert_eq!("Bb".parse::<PitchClass>(), Ok(PitchClass::ASharp));
    }

    #[test]
    fn rejects_malformed_labels() {
        assert_eq!("".parse::<NoteLabel>(), Err(FormatError::Empty));
        assert!(matches!("H4".parse::<NoteLabel>(), Err(FormatError::UnknownPitchClass(_))));
        assert!(matches!("C##4".parse::<NoteLabel>(), Err(FormatError::UnknownPitchClass(_))));
        assert!(matches!("4".parse::<NoteLabel>(), Err(FormatError::UnknownPitchClass(_))));
        assert!(matches!("C".parse::<NoteLabel>(), Err(FormatError::MissingOctave(_))));
        assert!(matches!("A-1".parse::<NoteLabel>(), Err(FormatError::InvalidOctave { .. })));
        assert!(matches!("G12".parse::<NoteLabel>(), Err(FormatError::InvalidOctave { .. })));
        assert!(matches!("E4x".parse::<NoteLabel>(), Err(FormatError::InvalidOctave { .. })));
        // The accidental carries the octave out of range.
        assert!(matches!("Cb0".parse::<NoteLabel>(), Err(FormatError::InvalidOctave { .. })));
        assert!(matches!("B#8".parse::<NoteLabel>(), Err(FormatError::InvalidOctave { .. })));
        assert_eq!("B#7".parse::<NoteLabel>(), Ok(NoteLabel::new(PitchClass::C, 8)));
    }

    #[test]
    fn display_round_trips_through_parse() {
        let note = NoteLabel::new(PitchClass::FSharp, 2);
        assert_eq!(note.to_string(), "F#2");
        assert_eq!(note.to_string().parse::<NoteLabel>(), Ok(note));
    }

    #[test]
    fn cents_between_octave_is_1200() {
        assert_abs_diff_eq!(cents_between(880.0, 440.0).unwrap(), 1200.0, epsilon = 1e-3);
        assert_eq!(cents_between(0.0, 440.0), None);
    }
}
