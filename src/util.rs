/// Linearly interpolates between `a` and `b`, with `t` clamped to the range 0 to 1.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

/// The position of `value` between `a` and `b` as a fraction, clamped to the range 0 to 1.
pub fn inverse_lerp(a: f64, b: f64, value: f64) -> f64 {
    if a == b {
        return 0.0;
    }
    ((value - a) / (b - a)).clamp(0.0, 1.0)
}

/// Converts a MIDI note value to a frequency in Hz.
pub fn hz_from_note(note: u8) -> f64 {
    440.0 * 2.0f64.powf((note as f64 - 69.0) / 12.0)
}

/// Converts a frequency in Hz to a fractional MIDI note value.
pub fn note_from_hz(frequency: f64) -> f64 {
    69.0 + 12.0 * (frequency / 440.0).log2()
}
