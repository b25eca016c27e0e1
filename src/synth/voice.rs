use super::bank::HarmonicBank;
use super::envelope::{AdsrEnvelope, AdsrParams, EnvelopeState};
use super::{Command, Patch, VoiceStatus};
use crate::processor::Processor;
use crate::string::MAX_HARMONICS;
use basedrop::{Shared, SharedCell};
use ringbuf_basedrop::Consumer;
use std::sync::Arc;

/// Peak level the envelope rises to on each pluck; loudness comes from the patch.
const TRIGGER_PEAK: f64 = 1.0;

/// The audio-thread half of a string.
///
/// `fill` never blocks, allocates, logs or fails: it drains pending commands,
/// takes the latest patch and writes one sample per slot.
///
/// A patch carrying a pluck whose trigger has not been handled yet plays with
/// the amplitudes and intensity of the pluck still sounding, so a new pluck
/// never sounds with the previous note's envelope.
pub struct StringVoice {
    patch: Shared<SharedCell<Patch>>,
    commands: Consumer<Command>,
    status: Arc<VoiceStatus>,
    envelope: AdsrEnvelope,
    bank: HarmonicBank,
    amplitudes: [f64; MAX_HARMONICS],
    intensity: f64,
    /// The pluck of the most recently handled trigger.
    pluck: u64,
    sample_rate: u32,
    inv_sample_rate: f64,
    sustain_pedal: bool,
    /// Whether the key is down, i.e. a trigger has not been followed by a release.
    key_held: bool,
}

impl StringVoice {
    pub(super) fn new(
        envelope: AdsrParams,
        patch: Shared<SharedCell<Patch>>,
        commands: Consumer<Command>,
        status: Arc<VoiceStatus>,
    ) -> Self {
        Self {
            patch,
            commands,
            status,
            envelope: AdsrEnvelope::new(envelope),
            bank: HarmonicBank::new(),
            amplitudes: [0.0; MAX_HARMONICS],
            intensity: 0.0,
            pluck: 0,
            sample_rate: 0,
            inv_sample_rate: 0.0,
            sustain_pedal: false,
            key_held: false,
        }
    }

    /// Fills `buffer` with mono samples at `sample_rate`. Silence while the string is off.
    pub fn fill(&mut self, buffer: &mut [f32], sample_rate: u32) {
        if sample_rate != self.sample_rate {
            self.set_sample_rate(sample_rate);
        }
        self.process(buffer);
    }

    pub fn envelope(&self) -> &AdsrEnvelope {
        &self.envelope
    }

    pub fn bank(&self) -> &HarmonicBank {
        &self.bank
    }

    /// Amplitudes of the pluck currently sounding.
    pub fn amplitudes(&self) -> &[f64; MAX_HARMONICS] {
        &self.amplitudes
    }

    /// Returns the number of commands handled and whether one was a trigger.
    fn handle_commands(&mut self) -> (u64, bool) {
        let mut handled = 0;
        let mut triggered = false;
        while let Some(command) = self.commands.pop() {
            handled += 1;
            match command {
                Command::Trigger => {
                    triggered = true;
                    self.key_held = true;
                    self.envelope.trigger(TRIGGER_PEAK);
                    self.bank.pluck();
                }
                Command::Release => {
                    self.key_held = false;
                    if !self.sustain_pedal {
                        self.envelope.release();
                    }
                }
                Command::SustainPedal(pressed) => {
                    self.sustain_pedal = pressed;
                    let state = self.envelope.state();
                    let held_back = state == EnvelopeState::Sustain || (!self.key_held && state.is_sounding());
                    if !pressed && held_back {
                        self.envelope.release();
                    }
                }
            }
        }
        (handled, triggered)
    }
}

impl Processor for StringVoice {
    fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.inv_sample_rate = if sample_rate > 0 {
            (sample_rate as f64).recip()
        } else {
            0.0
        };
    }

    fn process(&mut self, audio_out: &mut [f32]) {
        let (handled, triggered) = self.handle_commands();
        let mut patch = *self.patch.get();
        self.envelope.set_params(patch.envelope);

        if triggered {
            self.pluck = patch.pluck;
        }
        if patch.pluck == self.pluck {
            self.amplitudes = patch.amplitudes;
            self.intensity = patch.intensity;
        } else {
            let count = patch.harmonics.min(MAX_HARMONICS);
            self.amplitudes[count..].fill(0.0);
            patch.amplitudes = self.amplitudes;
            patch.intensity = self.intensity;
        }

        let dt = self.inv_sample_rate;
        let nyquist = 0.5 * self.sample_rate as f64;
        let mut written = 0;
        if self.envelope.is_active() && dt > 0.0 {
            for sample in audio_out.iter_mut() {
                let level = self.envelope.advance(dt);
                *sample = self.bank.process(&patch, level, dt, nyquist);
                written += 1;
                if !self.envelope.is_active() {
                    self.bank.reset_phases();
                    break;
                }
            }
        }
        audio_out[written..].fill(0.0);

        self.status.publish(self.envelope.state(), handled);
    }
}
