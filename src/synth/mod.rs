//! The string synthesizer, split across the two execution contexts.
//!
//! [`StringSynth`] lives on the control thread. It validates commands, computes
//! harmonic frequencies and pluck amplitudes, and publishes them as an immutable
//! [`Patch`]. [`StringVoice`] lives on the audio thread and owns all time-varying
//! state: the envelope, oscillator phases and the damping clock.
//!
//! The two halves share three things, none of which can block the audio thread:
//! - a `basedrop::SharedCell` holding the latest patch,
//! - a lock-free ring of [`Command`]s requesting envelope transitions,
//! - a [`VoiceStatus`] of atomics reporting the envelope back.

use crate::string::MAX_HARMONICS;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

pub use self::control::StringSynth;
pub use self::envelope::{AdsrEnvelope, AdsrParams, EnvelopeState};
pub use self::voice::StringVoice;

pub mod bank;
mod control;
pub mod envelope;
mod voice;

/// Everything the audio thread needs to know about the string, published as a whole.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Patch {
    /// Number of harmonics in use, at most [`MAX_HARMONICS`].
    pub harmonics: usize,
    /// Frequency of each harmonic in Hz.
    pub frequencies: [f64; MAX_HARMONICS],
    /// Initial amplitude of each harmonic, set by the most recent pluck.
    pub amplitudes: [f64; MAX_HARMONICS],
    pub envelope: AdsrParams,
    /// Damping coefficient; harmonic `n` decays at `damping·n²·0.1` per second.
    pub damping: f64,
    pub master_volume: f64,
    /// Clamped intensity of the most recent pluck.
    pub intensity: f64,
    /// Counts plucks. The voice holds back amplitudes of a pluck whose trigger it has not seen.
    pub pluck: u64,
}

/// Requests sent from the control thread to the audio thread.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Starts a new note from the latest patch.
    Trigger,
    /// Releases the note unless the sustain pedal holds it.
    Release,
    /// Presses or lifts the sustain pedal.
    SustainPedal(bool),
}

/// State reported by the audio thread. Written only by [`StringVoice`].
#[derive(Debug, Default)]
pub struct VoiceStatus {
    state: AtomicU8,
    commands_handled: AtomicU64,
}

impl VoiceStatus {
    pub fn state(&self) -> EnvelopeState {
        EnvelopeState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The number of commands the audio thread has taken off the queue.
    pub fn commands_handled(&self) -> u64 {
        self.commands_handled.load(Ordering::Acquire)
    }

    fn publish(&self, state: EnvelopeState, handled: u64) {
        self.state.store(state as u8, Ordering::Release);
        if handled > 0 {
            self.commands_handled.fetch_add(handled, Ordering::AcqRel);
        }
    }
}

/// Harmonic content of the most recent pluck, for an external waveform renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct HarmonicSnapshot {
    pub frequencies: Vec<f32>,
    pub amplitudes: Vec<f32>,
    pub string_length: f32,
}
