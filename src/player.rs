use crate::config::StringConfig;
use crate::note::{string_for_note, Note};
use crate::processor::AudioOutput;
use crate::string::{InvalidConfiguration, PhysicalProperties};
use crate::synth::{StringSynth, StringVoice};
use basedrop::Collector;
use tracing::{debug, info, warn};

/// Sample rate used to advance the voice when no output device is available.
pub const OFFLINE_SAMPLE_RATE: u32 = 48000;

const OFFLINE_BLOCK_FRAMES: usize = 1024;

enum Output {
    Device(AudioOutput),
    /// No device: `tick` advances the voice and discards its output.
    Offline {
        voice: StringVoice,
        buffer: Vec<f32>,
        sample_rate: u32,
        /// Fractional frames owed from earlier ticks.
        pending: f64,
    },
}

/// Drives one string from a host loop.
///
/// The host calls [`Player::tick`] regularly. It reclaims superseded patches and
/// pauses the output stream while the string is silent.
pub struct Player {
    synth: StringSynth,
    output: Output,
    // Dropped last, after everything holding a handle to it.
    collector: Collector,
}

impl Player {
    /// Opens the default output device, falling back to offline playback without one.
    pub fn initialize(config: &StringConfig) -> Result<Self, InvalidConfiguration> {
        let collector = Collector::new();
        let (synth, voice) = StringSynth::new(config, &collector.handle())?;
        match AudioOutput::open(voice) {
            Ok(output) => {
                info!(
                    sample_rate = output.sample_rate(),
                    channels = output.channels(),
                    "Playing through the default output"
                );
                Ok(Self {
                    synth,
                    output: Output::Device(output),
                    collector,
                })
            }
            Err(err) => {
                warn!(%err, "Audio output unavailable, running without sound");
                drop(synth);
                Self::offline_with(collector, config, OFFLINE_SAMPLE_RATE)
            }
        }
    }

    /// Creates a player without an output device. The voice only advances in `tick`.
    pub fn offline(config: &StringConfig, sample_rate: u32) -> Result<Self, InvalidConfiguration> {
        Self::offline_with(Collector::new(), config, sample_rate)
    }

    fn offline_with(collector: Collector, config: &StringConfig, sample_rate: u32) -> Result<Self, InvalidConfiguration> {
        InvalidConfiguration::check_range("sample rate", sample_rate as f64, 1.0, 384_000.0)?;
        let (synth, voice) = StringSynth::new(config, &collector.handle())?;
        info!(sample_rate, "Offline playback");
        Ok(Self {
            synth,
            output: Output::Offline {
                voice,
                buffer: vec![0.0; OFFLINE_BLOCK_FRAMES],
                sample_rate,
                pending: 0.0,
            },
            collector,
        })
    }

    /// Advances the host side by `dt` seconds.
    pub fn tick(&mut self, dt: f64) {
        match &mut self.output {
            Output::Device(output) => {
                let idle = self.synth.is_idle();
                if output.is_playing() && idle {
                    match output.pause() {
                        Ok(()) => debug!("Output paused"),
                        Err(err) => warn!(%err, "Failed to pause output"),
                    }
                } else if !output.is_playing() && !idle {
                    if let Err(err) = output.resume() {
                        warn!(%err, "Failed to resume output");
                    }
                }
            }
            Output::Offline {
                voice,
                buffer,
                sample_rate,
                pending,
            } => {
                if dt.is_finite() && dt > 0.0 {
                    *pending += dt * *sample_rate as f64;
                }
                let frames = pending.floor();
                *pending -= frames;
                let mut remaining = frames as usize;
                while remaining > 0 {
                    let block = remaining.min(buffer.len());
                    voice.fill(&mut buffer[..block], *sample_rate);
                    remaining -= block;
                }
            }
        }
        self.collector.collect();
    }

    pub fn pinch(&mut self) {
        self.synth.pinch();
        self.resume();
    }

    pub fn pinch_with(&mut self, intensity: f64) {
        self.synth.pinch_with(intensity);
        self.resume();
    }

    pub fn stop_pinch(&mut self) {
        self.synth.stop_pinch();
    }

    pub fn set_sustain_pedal(&mut self, pressed: bool) {
        self.synth.set_sustain_pedal(pressed);
    }

    pub fn set_properties(&mut self, length: f64, linear_density: f64, tension: f64) -> Result<(), InvalidConfiguration> {
        self.synth.set_properties(length, linear_density, tension)
    }

    /// Retunes the string to `note` with typical piano string dimensions.
    pub fn set_note(&mut self, note: Note) -> Result<PhysicalProperties, InvalidConfiguration> {
        let properties = string_for_note(note).properties;
        self.synth.set_physical_properties(properties)?;
        Ok(properties)
    }

    pub fn synth(&self) -> &StringSynth {
        &self.synth
    }

    pub fn is_offline(&self) -> bool {
        matches!(self.output, Output::Offline { .. })
    }

    /// The rate the voice is rendered at, by the device or offline.
    pub fn sample_rate(&self) -> u32 {
        match &self.output {
            Output::Device(output) => output.sample_rate(),
            Output::Offline { sample_rate, .. } => *sample_rate,
        }
    }

    /// Whether the output stream is running. Always false offline.
    pub fn is_playing(&self) -> bool {
        match &self.output {
            Output::Device(output) => output.is_playing(),
            Output::Offline { .. } => false,
        }
    }

    fn resume(&mut self) {
        if let Output::Device(output) = &mut self.output {
            if let Err(err) = output.resume() {
                warn!(%err, "Failed to resume output");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::synth::{AdsrParams, EnvelopeState};

    fn config() -> StringConfig {
        StringConfig {
            frequency_mapped_envelope: false,
            envelope: AdsrParams {
                attack: 0.01,
                decay: 0.05,
                sustain: 0.5,
                release: 0.1,
            },
            ..StringConfig::default()
        }
    }

    fn run(player: &mut Player, seconds: f64) {
        let steps = (seconds * 100.0).round() as usize;
        for _ in 0..steps {
            player.tick(0.01);
        }
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = StringConfig {
            tension: 0.0,
            ..config()
        };
        assert!(Player::offline(&config, 48000).is_err());
        assert!(Player::offline(&StringConfig::default(), 0).is_err());
    }

    #[test]
    fn test_offline_pinch_and_release() {
        let mut player = Player::offline(&config(), 48000).unwrap();
        assert!(player.is_offline());
        assert_eq!(player.sample_rate(), 48000);
        assert!(!player.is_playing());
        assert!(player.synth().is_idle());

        player.pinch();
        assert!(!player.synth().is_idle());
        run(&mut player, 0.1);
        assert_eq!(player.synth().envelope_state(), EnvelopeState::Sustain);

        player.stop_pinch();
        run(&mut player, 0.2);
        assert_eq!(player.synth().envelope_state(), EnvelopeState::Off);
        assert!(player.synth().is_idle());
    }

    #[test]
    fn test_fractional_ticks_accumulate() {
        let mut player = Player::offline(&config(), 1000).unwrap();
        player.pinch();
        // 0.0004 s at 1 kHz is less than one frame; 30 ticks add up to 12 frames.
        for _ in 0..30 {
            player.tick(0.0004);
        }
        assert_eq!(player.synth().envelope_state(), EnvelopeState::Decay);
    }

    #[test]
    fn test_set_note_retunes() {
        let mut player = Player::offline(&config(), 48000).unwrap();
        let properties = player.set_note("A3".parse().unwrap()).unwrap();
        assert_eq!(player.synth().properties(), properties);
        assert!((player.synth().fundamental() - 220.0).abs() < 1e-6);
    }

    #[test]
    fn test_set_properties_rejects_invalid() {
        let mut player = Player::offline(&config(), 48000).unwrap();
        let before = player.synth().fundamental();
        assert!(player.set_properties(0.65, -1.0, 86.0).is_err());
        assert_eq!(player.synth().fundamental(), before);
    }

    #[test]
    fn test_pedal_holds_note() {
        let mut player = Player::offline(&config(), 48000).unwrap();
        player.set_sustain_pedal(true);
        player.pinch_with(0.8);
        run(&mut player, 0.05);
        player.stop_pinch();
        run(&mut player, 0.3);
        assert_eq!(player.synth().envelope_state(), EnvelopeState::Sustain);
        player.set_sustain_pedal(false);
        run(&mut player, 0.2);
        assert_eq!(player.synth().envelope_state(), EnvelopeState::Off);
    }
}
