use super::Patch;
use crate::string::MAX_HARMONICS;
use std::f64::consts::TAU;
use std::ops::RangeInclusive;

/// Harmonics outside this range (in Hz) are skipped.
pub const AUDIBLE_RANGE: RangeInclusive<f64> = 20.0..=20_000.0;

/// Output samples are clamped to this magnitude to leave headroom below full scale.
pub const HEADROOM: f32 = 0.95;

/// Envelope level at or below which the string counts as silent.
pub const ACTIVITY_THRESHOLD: f64 = 0.001;

/// Per-harmonic damping grows with `n²` scaled by this factor.
const DAMPING_SCALE: f64 = 0.1;

/// A bank of phase-continuous, individually damped sine oscillators, one per harmonic.
#[derive(Clone, Debug)]
pub struct HarmonicBank {
    /// Phase of each harmonic in radians, kept within `[0, 2π)`.
    phases: [f64; MAX_HARMONICS],
    /// Seconds of audible output since the last pluck. Drives damping.
    time_since_pluck: f64,
}

impl HarmonicBank {
    pub fn new() -> Self {
        Self {
            phases: [0.0; MAX_HARMONICS],
            time_since_pluck: 0.0,
        }
    }

    /// Restarts the damping clock for a new pluck. Phases carry on.
    pub fn pluck(&mut self) {
        self.time_since_pluck = 0.0;
    }

    pub fn reset_phases(&mut self) {
        self.phases = [0.0; MAX_HARMONICS];
    }

    pub fn phases(&self) -> &[f64; MAX_HARMONICS] {
        &self.phases
    }

    pub fn time_since_pluck(&self) -> f64 {
        self.time_since_pluck
    }

    /// Produces the next sample of the summed harmonics, scaled by `envelope`.
    ///
    /// While the envelope is at or below [`ACTIVITY_THRESHOLD`] the string is silent
    /// and neither phases nor the damping clock advance.
    pub fn process(&mut self, patch: &Patch, envelope: f64, dt: f64, nyquist: f64) -> f32 {
        if envelope <= ACTIVITY_THRESHOLD {
            return 0.0;
        }

        let count = patch.harmonics.min(MAX_HARMONICS);
        let mut sum = 0.0;
        for h in 0..count {
            let frequency = patch.frequencies[h];
            if !AUDIBLE_RANGE.contains(&frequency) || frequency >= nyquist {
                continue;
            }

            let phase = &mut self.phases[h];
            *phase += TAU * frequency * dt;
            while *phase >= TAU {
                *phase -= TAU;
            }

            let n = (h + 1) as f64;
            let damping = (-patch.damping * n * n * DAMPING_SCALE * self.time_since_pluck).exp();
            sum += phase.sin() * patch.amplitudes[h] * damping * envelope;
        }
        self.time_since_pluck += dt;

        let sample = (sum * patch.master_volume * patch.intensity) as f32;
        if sample.is_finite() {
            sample.clamp(-HEADROOM, HEADROOM)
        } else {
            0.0
        }
    }
}

impl Default for HarmonicBank {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::synth::envelope::AdsrParams;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const SAMPLE_RATE: f64 = 48000.0;
    const DT: f64 = 1.0 / SAMPLE_RATE;
    const NYQUIST: f64 = SAMPLE_RATE / 2.0;

    fn single_harmonic(frequency: f64, amplitude: f64) -> Patch {
        let mut patch = Patch {
            harmonics: 1,
            frequencies: [0.0; MAX_HARMONICS],
            amplitudes: [0.0; MAX_HARMONICS],
            envelope: AdsrParams::default(),
            damping: 0.0,
            master_volume: 1.0,
            intensity: 1.0,
            pluck: 0,
        };
        patch.frequencies[0] = frequency;
        patch.amplitudes[0] = amplitude;
        patch
    }

    #[test]
    fn test_single_harmonic_frequency() {
        let patch = single_harmonic(440.0, 0.5);
        let mut bank = HarmonicBank::new();
        let samples: Vec<f32> = (0..48000).map(|_| bank.process(&patch, 1.0, DT, NYQUIST)).collect();

        let mut crossings = 0u32;
        for i in 1..samples.len() {
            if samples[i - 1] < 0.0 && samples[i] >= 0.0 {
                crossings += 1;
            }
        }
        assert!((crossings as f64 - 440.0).abs() < 2.0, "{crossings} crossings");
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        assert!((peak - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_phase_stays_wrapped() {
        let patch = single_harmonic(19_000.0, 0.1);
        let mut bank = HarmonicBank::new();
        for _ in 0..100_000 {
            bank.process(&patch, 1.0, DT, NYQUIST);
            assert!((0.0..TAU).contains(&bank.phases()[0]));
        }
    }

    #[test]
    fn test_inaudible_harmonics_are_skipped() {
        let mut bank = HarmonicBank::new();
        for frequency in [10.0, 21_000.0] {
            let patch = single_harmonic(frequency, 0.5);
            assert_eq!(bank.process(&patch, 1.0, DT, 96_000.0), 0.0);
            assert_eq!(bank.phases()[0], 0.0);
        }
        let patch = single_harmonic(15_000.0, 0.5);
        assert_eq!(bank.process(&patch, 1.0, 1.0 / 22050.0, 11_025.0), 0.0);
    }

    #[test]
    fn test_silent_envelope_pauses_clock() {
        let patch = single_harmonic(440.0, 0.5);
        let mut bank = HarmonicBank::new();
        for _ in 0..100 {
            assert_eq!(bank.process(&patch, ACTIVITY_THRESHOLD, DT, NYQUIST), 0.0);
        }
        assert_eq!(bank.time_since_pluck(), 0.0);
        assert_eq!(bank.phases()[0], 0.0);

        bank.process(&patch, 1.0, DT, NYQUIST);
        assert!((bank.time_since_pluck() - DT).abs() < 1e-15);
        bank.pluck();
        assert_eq!(bank.time_since_pluck(), 0.0);
        assert!(bank.phases()[0] > 0.0);
    }

    #[test]
    fn test_higher_harmonics_damp_faster() {
        let mut patch = single_harmonic(200.0, 0.3);
        patch.harmonics = 2;
        patch.damping = 0.5;
        patch.frequencies[1] = 400.0;
        patch.amplitudes[1] = 0.3;

        let mut bank = HarmonicBank::new();
        for _ in 0..48000 {
            bank.process(&patch, 1.0, DT, NYQUIST);
        }
        let t = bank.time_since_pluck();
        let first = (-0.5 * 1.0 * 0.1 * t).exp();
        let second = (-0.5 * 4.0 * 0.1 * t).exp();
        assert!(second < first);
        assert!((t - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_output_is_clamped() {
        let mut patch = single_harmonic(100.0, 0.0);
        patch.harmonics = MAX_HARMONICS;
        for h in 0..MAX_HARMONICS {
            patch.frequencies[h] = 100.0 * (h + 1) as f64;
            patch.amplitudes[h] = 5.0;
        }
        let mut bank = HarmonicBank::new();
        let mut clipped = false;
        for _ in 0..4800 {
            let sample = bank.process(&patch, 1.0, DT, NYQUIST);
            assert!(sample.abs() <= HEADROOM);
            clipped |= sample.abs() == HEADROOM;
        }
        assert!(clipped);
    }

    #[test]
    fn test_output_bounded_for_random_patches() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let mut patch = single_harmonic(0.0, 0.0);
            patch.harmonics = rng.gen_range(1..=MAX_HARMONICS);
            patch.damping = rng.gen_range(0.0..2.0);
            patch.master_volume = rng.gen_range(0.0..=1.0);
            patch.intensity = rng.gen_range(0.0..=1.0);
            for h in 0..patch.harmonics {
                patch.frequencies[h] = rng.gen_range(0.0..30_000.0);
                patch.amplitudes[h] = rng.gen_range(-2.0..2.0);
            }
            let mut bank = HarmonicBank::new();
            for _ in 0..256 {
                let envelope = rng.gen_range(0.0..=1.0);
                let sample = bank.process(&patch, envelope, DT, NYQUIST);
                assert!((-HEADROOM..=HEADROOM).contains(&sample));
            }
        }
    }
}
