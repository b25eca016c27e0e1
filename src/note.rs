use crate::string::PhysicalProperties;
use crate::util::{hz_from_note, inverse_lerp, lerp, note_from_hz};
use std::str::FromStr;
use thiserror::Error;

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// A note on the equal-tempered scale, as a MIDI note number (A4 = 69 = 440 Hz).
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Note(pub u8);

impl From<u8> for Note {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.pitch_class(), self.octave())
    }
}

impl std::fmt::Debug for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseNoteError {
    #[error("note name is empty")]
    Empty,
    #[error("unknown note letter in {0:?}")]
    Letter(String),
    #[error("invalid octave in {0:?}")]
    Octave(String),
    #[error("note {0:?} is outside the MIDI range")]
    OutOfRange(String),
}

impl FromStr for Note {
    type Err = ParseNoteError;

    /// Parses names such as `A4`, `C#3`, `Bb0` or `C-1`.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let name = name.trim();
        let mut chars = name.chars();
        let letter = chars.next().ok_or(ParseNoteError::Empty)?;
        let base: i32 = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(ParseNoteError::Letter(name.to_string())),
        };

        let rest = chars.as_str();
        let (offset, octave) = match rest.as_bytes().first() {
            Some(b'#') => (1, &rest[1..]),
            Some(b'b') => (-1, &rest[1..]),
            _ => (0, rest),
        };
        let octave: i32 = octave.parse().map_err(|_| ParseNoteError::Octave(name.to_string()))?;

        let number = (octave + 1) * 12 + base + offset;
        u8::try_from(number)
            .ok()
            .filter(|n| *n < 128)
            .map(Note)
            .ok_or_else(|| ParseNoteError::OutOfRange(name.to_string()))
    }
}

impl Note {
    pub fn middle_c() -> Self {
        Self(60)
    }

    pub fn pitch_class(&self) -> &'static str {
        NOTE_NAMES[(self.0 % 12) as usize]
    }

    pub fn octave(&self) -> i32 {
        self.0 as i32 / 12 - 1
    }

    pub fn frequency(&self) -> f64 {
        hz_from_note(self.0)
    }

    pub fn transpose(&self, offset: i8) -> Self {
        Self(self.0.saturating_add_signed(offset).min(127))
    }
}

/// Names the note nearest to `frequency`, with the deviation in cents when off pitch.
///
/// For example `"A4"` for 440 Hz and `"A4 (+3.9 cents)"` for 441 Hz.
pub fn name_from_frequency(frequency: f64) -> String {
    let exact = note_from_hz(frequency);
    let nearest = exact.round();
    let cents = 100.0 * (exact - nearest);
    let pitch_class = NOTE_NAMES[(nearest as i64).rem_euclid(12) as usize];
    let octave = (nearest as i64).div_euclid(12) - 1;
    if (cents * 10.0).round() == 0.0 {
        format!("{pitch_class}{octave}")
    } else {
        format!("{pitch_class}{octave} ({cents:+.1} cents)")
    }
}

/// Typical dimensions of the piano string for a note.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StringData {
    pub note: Note,
    pub frequency: f64,
    pub properties: PhysicalProperties,
    /// Number of unison strings struck for this note.
    pub unisons: u8,
}

/// Register boundaries in Hz: bass below C4, middle below C6, treble up to C8.
const BASS_RANGE: (f64, f64) = (27.5, 261.63);
const MIDDLE_RANGE: (f64, f64) = (261.63, 1046.5);
const TREBLE_RANGE: (f64, f64) = (1046.5, 4186.0);
/// Middle strings switch from two to three unisons at C5.
const TRICHORD_FROM: f64 = 523.25;

/// Computes plausible string dimensions for a note.
///
/// Density and tension are interpolated within the note's register, then the
/// length is solved from `f = (1/2L)·√(T/μ)` so the string sounds at the note's
/// frequency.
pub fn string_for_note(note: Note) -> StringData {
    let frequency = note.frequency();

    let band = |(low, high): (f64, f64), density: (f64, f64), tension: (f64, f64)| {
        let t = inverse_lerp(low, high, frequency);
        (lerp(density.0, density.1, t), lerp(tension.0, tension.1, t))
    };
    let ((linear_density, tension), unisons) = if frequency < BASS_RANGE.1 {
        (band(BASS_RANGE, (0.08, 0.02), (700.0, 900.0)), 1)
    } else if frequency < MIDDLE_RANGE.1 {
        let unisons = if frequency < TRICHORD_FROM { 2 } else { 3 };
        (band(MIDDLE_RANGE, (0.015, 0.005), (800.0, 1000.0)), unisons)
    } else {
        (band(TREBLE_RANGE, (0.008, 0.003), (900.0, 1200.0)), 3)
    };

    let length = (tension / linear_density).sqrt() / (2.0 * frequency);

    StringData {
        note,
        frequency,
        properties: PhysicalProperties {
            length,
            linear_density,
            tension,
        },
        unisons,
    }
}
