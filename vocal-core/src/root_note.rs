//! # Root Note Module
//!
//! Picks a comfortable reference note for a singer from their range: the
//! middle of the range, kept inside the comfortable inner part of it and moved
//! by whole octaves into octaves 3-5.

use crate::note::{self, A4_FREQUENCY, NoteLabel};
use crate::range::VocalRangeResult;

/// Lowest octave a root note is transposed into.
pub const MIN_ROOT_OCTAVE: i32 = 3;
/// Highest octave a root note is transposed into.
pub const MAX_ROOT_OCTAVE: i32 = 5;

/// Fraction of the range, from either end, excluded from the comfort window.
const COMFORT_MARGIN: f32 = 0.2;

/// Computes the root note for the range `[low_hz, high_hz]`.
///
/// 1. Take the midpoint and clamp it into the comfort window, the inner 60% of
///    the range.
/// 2. Map it to the nearest note.
/// 3. Transpose by whole octaves until the note lies in octaves 3-5.
/// 4. If the transposed frequency left `[low_hz, high_hz]`, use the note
///    nearest the violated bound instead. Staying in range wins over the
///    octave preference.
///
/// Bounds given in the wrong order are swapped. A range with a non-positive or
/// non-finite bound yields the A4 fallback.
///
/// # Returns
/// * The chosen note with `cents_offset` zero
pub fn calculate_optimal_root_note(low_hz: f32, high_hz: f32) -> NoteLabel {
    let (low, high) = if low_hz <= high_hz {
        (low_hz, high_hz)
    } else {
        (high_hz, low_hz)
    };
    if !low.is_finite() || !high.is_finite() || low <= 0.0 {
        log::debug!("no root note for range {low_hz}-{high_hz} Hz");
        return without_cents(note::frequency_to_note(A4_FREQUENCY));
    }

    let span = high - low;
    let midpoint = (low + high) / 2.0;
    let mut frequency = midpoint.clamp(low + COMFORT_MARGIN * span, high - COMFORT_MARGIN * span);
    let mut root = note::frequency_to_note(frequency);

    while root.octave < MIN_ROOT_OCTAVE {
        frequency *= 2.0;
        root = note::frequency_to_note(frequency);
    }
    while root.octave > MAX_ROOT_OCTAVE {
        frequency /= 2.0;
        root = note::frequency_to_note(frequency);
    }

    if frequency < low {
        root = note::frequency_to_note(low);
    } else if frequency > high {
        root = note::frequency_to_note(high);
    }
    without_cents(root)
}

fn without_cents(note: NoteLabel) -> NoteLabel {
    NoteLabel::new(note.pitch_class, note.octave)
}

impl VocalRangeResult {
    /// Root note for this range. See [`calculate_optimal_root_note`].
    pub fn optimal_root_note(&self) -> NoteLabel {
        calculate_optimal_root_note(self.lowest_frequency_hz, self.highest_frequency_hz)
    }
}
