use crate::string::InvalidConfiguration;
use crate::util::{inverse_lerp, lerp};
use serde::Deserialize;

/// Stage boundaries are crossed within this many seconds of their nominal time,
/// so that accumulated floating point steps land on the boundary.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Shape of the decay curve; the decay covers `1 - e^-3` of its range.
const DECAY_CURVATURE: f64 = 3.0;
/// Rate of the slow natural decay while a note is held, in nepers per second.
const SUSTAIN_DECAY_RATE: f64 = 0.3;
/// Release curvature; the level falls by `e^-4` over the release time.
const RELEASE_CURVATURE: f64 = 4.0;

/// Range of fundamentals covered by the frequency mapping curves (A0 to C8).
const LOWEST_FUNDAMENTAL: f64 = 27.5;
const HIGHEST_FUNDAMENTAL: f64 = 4186.0;

/// Timing and level parameters of an ADSR envelope.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AdsrParams {
    /// Attack time in seconds.
    pub attack: f64,
    /// Decay time in seconds.
    pub decay: f64,
    /// Sustain level relative to the peak, between 0 and 1.
    pub sustain: f64,
    /// Release time in seconds.
    pub release: f64,
}

impl Default for AdsrParams {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.3,
            sustain: 0.7,
            release: 1.5,
        }
    }
}

impl AdsrParams {
    pub fn validate(&self) -> Result<(), InvalidConfiguration> {
        InvalidConfiguration::check_range("attack", self.attack, f64::MIN_POSITIVE, f64::MAX)?;
        InvalidConfiguration::check_range("decay", self.decay, f64::MIN_POSITIVE, f64::MAX)?;
        InvalidConfiguration::check_range("sustain", self.sustain, 0.0, 1.0)?;
        InvalidConfiguration::check_range("release", self.release, f64::MIN_POSITIVE, f64::MAX)
    }

    /// Derives envelope parameters from a string's fundamental frequency.
    ///
    /// Each parameter follows a monotone curve over the log-frequency range of a
    /// piano: bass strings speak a little slower, decay and release for longer, and
    /// hold a higher sustain level than treble strings.
    pub fn for_frequency(fundamental: f64) -> Self {
        let position = inverse_lerp(
            LOWEST_FUNDAMENTAL.log2(),
            HIGHEST_FUNDAMENTAL.log2(),
            fundamental.max(f64::MIN_POSITIVE).log2(),
        );
        Self {
            attack: lerp(0.012, 0.002, position),
            decay: lerp(0.8, 0.15, position),
            sustain: lerp(0.6, 0.35, position),
            release: lerp(3.0, 0.4, position),
        }
    }
}

/// The externally visible stage of an envelope.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EnvelopeState {
    Off = 0,
    Attack = 1,
    Decay = 2,
    Sustain = 3,
    Release = 4,
}

impl EnvelopeState {
    pub fn is_active(self) -> bool {
        self != EnvelopeState::Off
    }

    /// Whether the note is still held, i.e. not yet released or silent.
    pub fn is_sounding(self) -> bool {
        matches!(self, EnvelopeState::Attack | EnvelopeState::Decay | EnvelopeState::Sustain)
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => EnvelopeState::Attack,
            2 => EnvelopeState::Decay,
            3 => EnvelopeState::Sustain,
            4 => EnvelopeState::Release,
            _ => EnvelopeState::Off,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Stage {
    Attack {
        /// The level the attack started from.
        start: f64,
        /// Seconds since the attack started.
        t: f64,
    },
    Decay {
        t: f64,
    },
    Sustain {
        t: f64,
    },
    Release {
        /// The level at the moment of release.
        start: f64,
        t: f64,
    },
    Off,
}

/// An attack-decay-sustain-release envelope advanced by explicit time steps.
#[derive(Clone, Copy, Debug)]
pub struct AdsrEnvelope {
    params: AdsrParams,
    /// Level reached at the end of the attack.
    peak: f64,
    stage: Stage,
    /// The most recent output level.
    level: f64,
}

impl AdsrEnvelope {
    pub fn new(params: AdsrParams) -> Self {
        Self {
            params,
            peak: 0.0,
            stage: Stage::Off,
            level: 0.0,
        }
    }

    pub fn params(&self) -> AdsrParams {
        self.params
    }

    /// Replaces the envelope parameters without disturbing the current stage.
    pub fn set_params(&mut self, params: AdsrParams) {
        self.params = params;
    }

    pub fn state(&self) -> EnvelopeState {
        match self.stage {
            Stage::Attack { .. } => EnvelopeState::Attack,
            Stage::Decay { .. } => EnvelopeState::Decay,
            Stage::Sustain { .. } => EnvelopeState::Sustain,
            Stage::Release { .. } => EnvelopeState::Release,
            Stage::Off => EnvelopeState::Off,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// The level produced by the most recent call to [`AdsrEnvelope::advance`].
    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn peak(&self) -> f64 {
        self.peak
    }

    /// Starts a new attack towards `peak`.
    ///
    /// The attack rises from the current level, so retriggering a sounding note
    /// does not jump to silence first.
    pub fn trigger(&mut self, peak: f64) {
        self.peak = peak;
        self.stage = Stage::Attack {
            start: self.level,
            t: 0.0,
        };
    }

    /// Moves a sounding envelope into its release. Does nothing once off.
    pub fn release(&mut self) {
        if let Stage::Off = self.stage {
            return;
        }
        self.stage = Stage::Release {
            start: self.level,
            t: 0.0,
        };
    }

    /// Silences the envelope immediately.
    pub fn reset(&mut self) {
        self.stage = Stage::Off;
        self.level = 0.0;
    }

    /// Advances the envelope by `dt` seconds and returns the new level.
    ///
    /// Time left over after crossing a stage boundary carries into the next stage.
    pub fn advance(&mut self, dt: f64) -> f64 {
        use Stage::*;

        let AdsrParams {
            attack,
            decay,
            sustain,
            release,
        } = self.params;
        let peak = self.peak;

        let mut stage = match self.stage {
            Attack { start, t } => Attack { start, t: t + dt },
            Decay { t } => Decay { t: t + dt },
            Sustain { t } => Sustain { t: t + dt },
            Release { start, t } => Release { start, t: t + dt },
            Off => Off,
        };

        self.level = loop {
            match stage {
                Attack { start, t } => {
                    if t >= attack - BOUNDARY_EPSILON {
                        stage = Decay {
                            t: (t - attack).max(0.0),
                        };
                        continue;
                    }
                    break lerp(start, peak, t / attack);
                }
                Decay { t } => {
                    if t >= decay - BOUNDARY_EPSILON {
                        stage = Sustain {
                            t: (t - decay).max(0.0),
                        };
                        continue;
                    }
                    let progress = 1.0 - (-DECAY_CURVATURE * t / decay).exp();
                    break lerp(peak, peak * sustain, progress);
                }
                Sustain { t } => break peak * sustain * (-SUSTAIN_DECAY_RATE * t).exp(),
                Release { start, t } => {
                    if t >= release - BOUNDARY_EPSILON {
                        stage = Off;
                        continue;
                    }
                    break start * (-RELEASE_CURVATURE * t / release).exp();
                }
                Off => break 0.0,
            }
        };
        self.stage = stage;

        self.level
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn envelope() -> AdsrEnvelope {
        AdsrEnvelope::new(AdsrParams {
            attack: 0.01,
            decay: 0.3,
            sustain: 0.7,
            release: 1.5,
        })
    }

    #[test]
    fn test_starts_off_and_silent() {
        let mut env = envelope();
        assert_eq!(env.state(), EnvelopeState::Off);
        assert!(!env.is_active());
        assert_eq!(env.advance(0.1), 0.0);
    }

    #[test]
    fn test_attack_ramps_linearly() {
        let mut env = envelope();
        env.trigger(1.0);
        assert_eq!(env.state(), EnvelopeState::Attack);
        let level = env.advance(0.005);
        assert!((level - 0.5).abs() < TOLERANCE);
        assert_eq!(env.state(), EnvelopeState::Attack);
    }

    #[test]
    fn test_attack_reaches_peak_then_decays() {
        let mut env = envelope();
        env.trigger(1.0);
        let level = env.advance(0.01);
        assert_eq!(env.state(), EnvelopeState::Decay);
        assert!((level - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_attack_plus_decay_reaches_sustain() {
        let mut env = envelope();
        env.trigger(1.0);
        let level = env.advance(0.01 + 0.3);
        assert_eq!(env.state(), EnvelopeState::Sustain);
        assert!((level - 0.7).abs() < TOLERANCE);
    }

    #[test]
    fn test_stage_boundaries_with_sample_steps() {
        let mut env = envelope();
        let dt = 1.0 / 48000.0;
        env.trigger(1.0);
        let mut level = 0.0;
        for _ in 0..480 {
            level = env.advance(dt);
        }
        assert_eq!(env.state(), EnvelopeState::Decay);
        assert!((level - 1.0).abs() < 1e-3);
        for _ in 0..(0.3 * 48000.0) as usize {
            level = env.advance(dt);
        }
        assert_eq!(env.state(), EnvelopeState::Sustain);
        assert!((level - 0.7).abs() < 1e-3);
    }

    #[test]
    fn test_decay_is_concave() {
        let mut env = envelope();
        env.trigger(1.0);
        env.advance(0.01);
        let first = 1.0 - env.advance(0.1);
        let second = (1.0 - first) - env.advance(0.1);
        assert!(first > second, "{first} should exceed {second}");
    }

    #[test]
    fn test_sustain_decays_slowly() {
        let mut env = envelope();
        env.trigger(1.0);
        env.advance(0.31);
        let level = env.advance(1.0);
        assert_eq!(env.state(), EnvelopeState::Sustain);
        assert!((level - 0.7 * (-0.3f64).exp()).abs() < TOLERANCE);
    }

    #[test]
    fn test_release_from_sustain_reaches_off() {
        let mut env = envelope();
        env.trigger(1.0);
        env.advance(0.31);
        env.release();
        assert_eq!(env.state(), EnvelopeState::Release);
        let level = env.advance(0.75);
        assert!((level - 0.7 * (-2.0f64).exp()).abs() < TOLERANCE);
        let level = env.advance(0.75);
        assert_eq!(env.state(), EnvelopeState::Off);
        assert_eq!(level, 0.0);
    }

    #[test]
    fn test_release_when_off_is_noop() {
        let mut env = envelope();
        env.release();
        assert_eq!(env.state(), EnvelopeState::Off);
        assert_eq!(env.advance(0.01), 0.0);
    }

    #[test]
    fn test_release_during_attack_starts_from_current_level() {
        let mut env = envelope();
        env.trigger(1.0);
        env.advance(0.005);
        env.release();
        let level = env.advance(0.0);
        assert!((level - 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn test_retrigger_rises_from_current_level() {
        let mut env = envelope();
        env.trigger(1.0);
        env.advance(0.31);
        env.release();
        let released = env.advance(0.2);
        env.trigger(1.0);
        assert_eq!(env.state(), EnvelopeState::Attack);
        let level = env.advance(0.0);
        assert!((level - released).abs() < TOLERANCE);
        let level = env.advance(0.01);
        assert!((level - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_peak_scales_output() {
        let mut env = envelope();
        env.trigger(0.5);
        let level = env.advance(0.31);
        assert!((level - 0.35).abs() < TOLERANCE);
    }

    #[test]
    fn test_frequency_mapping_is_monotone() {
        let mut previous = AdsrParams::for_frequency(20.0);
        let mut f = 20.0;
        while f < 8000.0 {
            f *= 1.1;
            let params = AdsrParams::for_frequency(f);
            assert!(params.release <= previous.release);
            assert!(params.decay <= previous.decay);
            assert!(params.attack <= previous.attack);
            assert!(params.sustain <= previous.sustain);
            assert!(params.validate().is_ok());
            previous = params;
        }
        let bass = AdsrParams::for_frequency(55.0);
        let treble = AdsrParams::for_frequency(2000.0);
        assert!(bass.release > treble.release);
        assert!(bass.decay > treble.decay);
    }

    #[test]
    fn test_validate_params() {
        assert!(AdsrParams::default().validate().is_ok());
        let params = AdsrParams {
            attack: 0.0,
            ..AdsrParams::default()
        };
        assert!(params.validate().is_err());
        let params = AdsrParams {
            sustain: 1.2,
            ..AdsrParams::default()
        };
        assert!(params.validate().is_err());
    }
}
