use super::{Command, EnvelopeState, HarmonicSnapshot, Patch, StringVoice, VoiceStatus};
use crate::config::{validate_harmonics, StringConfig};
use crate::string::excitation::{clamp_intensity, pluck};
use crate::string::physics::compute_harmonics;
use crate::string::{InvalidConfiguration, PhysicalProperties, MAX_HARMONICS};
use crate::synth::AdsrParams;
use basedrop::{Handle, Shared, SharedCell};
use ringbuf_basedrop::{Producer, RingBuffer};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The control-thread half of a string.
///
/// Every method returns immediately. Changes reach the audio thread through a
/// freshly published [`Patch`] or a queued [`Command`].
pub struct StringSynth {
    config: StringConfig,
    properties: PhysicalProperties,
    /// The working copy of the published patch.
    patch: Patch,
    published: Shared<SharedCell<Patch>>,
    handle: Handle,
    commands: Producer<Command>,
    commands_sent: u64,
    status: Arc<VoiceStatus>,
    sustain_pedal: bool,
    snapshot: Option<HarmonicSnapshot>,
}

impl StringSynth {
    /// Creates a string and the audio-thread voice that plays it.
    ///
    /// Patches replaced later on are reclaimed by the collector behind `handle`.
    pub fn new(config: &StringConfig, handle: &Handle) -> Result<(StringSynth, StringVoice), InvalidConfiguration> {
        config.validate()?;

        let properties = config.properties();
        let mut patch = Patch {
            harmonics: config.harmonics,
            frequencies: [0.0; MAX_HARMONICS],
            amplitudes: [0.0; MAX_HARMONICS],
            envelope: config.envelope,
            damping: config.damping,
            master_volume: config.master_volume,
            intensity: clamp_intensity(config.pinch_intensity, config.min_intensity, config.max_intensity),
            pluck: 0,
        };
        tune(&mut patch, config, &properties);

        let published = Shared::new(handle, SharedCell::new(Shared::new(handle, patch)));
        let (producer, consumer) = RingBuffer::<Command>::new(config.command_capacity).split(handle);
        let status = Arc::new(VoiceStatus::default());

        let voice = StringVoice::new(patch.envelope, published.clone(), consumer, status.clone());
        let synth = StringSynth {
            config: config.clone(),
            properties,
            patch,
            published,
            handle: handle.clone(),
            commands: producer,
            commands_sent: 0,
            status,
            sustain_pedal: false,
            snapshot: None,
        };

        info!(
            fundamental = synth.fundamental(),
            harmonics = config.harmonics,
            "String initialized"
        );
        Ok((synth, voice))
    }

    /// Retunes the string. Safe while a note sounds: only frequencies and envelope
    /// timings change.
    ///
    /// Invalid properties are rejected and the previous tuning is kept.
    pub fn set_properties(&mut self, length: f64, linear_density: f64, tension: f64) -> Result<(), InvalidConfiguration> {
        self.set_physical_properties(PhysicalProperties {
            length,
            linear_density,
            tension,
        })
    }

    pub fn set_physical_properties(&mut self, properties: PhysicalProperties) -> Result<(), InvalidConfiguration> {
        if let Err(err) = properties.validate() {
            warn!(%err, "Rejected string properties");
            return Err(err);
        }

        self.properties = properties;
        tune(&mut self.patch, &self.config, &properties);
        self.publish();
        self.refresh_snapshot();

        info!(
            length = properties.length,
            linear_density = properties.linear_density,
            tension = properties.tension,
            fundamental = self.fundamental(),
            "String properties set"
        );
        Ok(())
    }

    /// Changes how many harmonics are synthesized.
    ///
    /// Harmonics added this way stay silent until the next pluck.
    pub fn set_harmonics_count(&mut self, count: usize) -> Result<(), InvalidConfiguration> {
        if let Err(err) = validate_harmonics(count) {
            warn!(%err, "Rejected harmonic count");
            return Err(err);
        }

        let previous = self.patch.harmonics;
        for amplitude in &mut self.patch.amplitudes[previous.min(count)..] {
            *amplitude = 0.0;
        }
        self.patch.harmonics = count;
        self.config.harmonics = count;
        tune(&mut self.patch, &self.config, &self.properties);
        self.publish();
        self.refresh_snapshot();

        debug!(count, "Harmonic count set");
        Ok(())
    }

    /// Plucks the string at the configured baseline intensity.
    pub fn pinch(&mut self) {
        self.pinch_with(self.config.pinch_intensity);
    }

    /// Plucks the string. The intensity is clamped to the configured bounds.
    pub fn pinch_with(&mut self, intensity: f64) {
        let intensity = clamp_intensity(intensity, self.config.min_intensity, self.config.max_intensity);
        let count = self.patch.harmonics;
        pluck(
            self.config.pinch_position,
            intensity,
            self.config.brightness,
            &mut self.patch.amplitudes[..count],
        );
        self.patch.intensity = intensity;
        self.patch.pluck += 1;
        self.publish();
        self.send(Command::Trigger);
        self.refresh_snapshot();

        info!(fundamental = self.fundamental(), intensity, "Pinch");
    }

    /// Releases the note, unless the sustain pedal is holding it.
    pub fn stop_pinch(&mut self) {
        self.send(Command::Release);
        debug!(sustained = self.sustain_pedal, "Stop pinch");
    }

    pub fn set_sustain_pedal(&mut self, pressed: bool) {
        if pressed == self.sustain_pedal {
            return;
        }
        self.sustain_pedal = pressed;
        self.send(Command::SustainPedal(pressed));
        debug!(pressed, "Sustain pedal");
    }

    pub fn sustain_pedal(&self) -> bool {
        self.sustain_pedal
    }

    pub fn config(&self) -> &StringConfig {
        &self.config
    }

    pub fn properties(&self) -> PhysicalProperties {
        self.properties
    }

    pub fn fundamental(&self) -> f64 {
        self.properties.fundamental()
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.patch.frequencies[..self.patch.harmonics]
    }

    pub fn amplitudes(&self) -> &[f64] {
        &self.patch.amplitudes[..self.patch.harmonics]
    }

    pub fn envelope_params(&self) -> AdsrParams {
        self.patch.envelope
    }

    /// The envelope state last reported by the audio thread.
    pub fn envelope_state(&self) -> EnvelopeState {
        self.status.state()
    }

    pub fn is_active(&self) -> bool {
        self.envelope_state().is_active()
    }

    /// True once the voice is silent and has handled every command sent to it.
    pub fn is_idle(&self) -> bool {
        !self.is_active() && self.status.commands_handled() == self.commands_sent
    }

    /// The harmonic content of the latest pluck, when visualization is enabled.
    pub fn snapshot(&self) -> Option<&HarmonicSnapshot> {
        self.snapshot.as_ref()
    }

    fn publish(&mut self) {
        self.published.set(Shared::new(&self.handle, self.patch));
    }

    fn send(&mut self, command: Command) {
        match self.commands.push(command) {
            Ok(()) => self.commands_sent += 1,
            Err(command) => warn!(?command, "Command queue is full, dropping command"),
        }
    }

    fn refresh_snapshot(&mut self) {
        if !self.config.visualization {
            return;
        }
        self.snapshot = Some(HarmonicSnapshot {
            frequencies: self.frequencies().iter().map(|&f| f as f32).collect(),
            amplitudes: self.amplitudes().iter().map(|&a| a as f32).collect(),
            string_length: self.properties.length as f32,
        });
    }
}

/// Recomputes the frequency-dependent parts of `patch` for a string.
fn tune(patch: &mut Patch, config: &StringConfig, properties: &PhysicalProperties) {
    let fundamental = properties.fundamental();
    compute_harmonics(
        fundamental,
        config.inharmonicity,
        &mut patch.frequencies[..patch.harmonics],
    );
    patch.envelope = config.envelope_for(fundamental);
}
