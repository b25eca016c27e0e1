use std::f64::consts::PI;

/// Clamps a pluck intensity into `min..=max`. NaN maps to `min`.
pub fn clamp_intensity(intensity: f64, min: f64, max: f64) -> f64 {
    if intensity.is_nan() {
        min
    } else {
        intensity.clamp(min, max)
    }
}

/// Fills `amplitudes` with the initial amplitude of each harmonic after a pluck.
///
/// Uses the Fourier series of a string pulled aside at `position` (a fraction of its
/// length): `a_n = 2·I/(n²π²)·sin(nπ·position)` for `n = i + 1`. A pluck at a
/// harmonic's node leaves that harmonic silent.
///
/// `brightness` scales harmonic `n` by `n^(brightness·I)`, so harder plucks give a
/// slower spectral roll-off. Zero leaves the series untouched.
pub fn pluck(position: f64, intensity: f64, brightness: f64, amplitudes: &mut [f64]) {
    let emphasis = brightness * intensity;
    for (i, amplitude) in amplitudes.iter_mut().enumerate() {
        let n = (i + 1) as f64;
        let shape = (n * PI * position).sin();
        *amplitude = 2.0 * intensity / (n * n * PI * PI) * shape * n.powf(emphasis);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamp_intensity() {
        assert_eq!(clamp_intensity(0.5, 0.1, 1.0), 0.5);
        assert_eq!(clamp_intensity(3.0, 0.1, 1.0), 1.0);
        assert_eq!(clamp_intensity(-1.0, 0.1, 1.0), 0.1);
        assert_eq!(clamp_intensity(f64::NAN, 0.1, 1.0), 0.1);
    }

    #[test]
    fn test_fundamental_amplitude() {
        let mut amplitudes = [0.0; 1];
        pluck(0.5, 1.0, 0.0, &mut amplitudes);
        assert!((amplitudes[0] - 2.0 / (PI * PI)).abs() < 1e-12);
    }

    #[test]
    fn test_pluck_at_node_silences_harmonic() {
        let mut amplitudes = [0.0; 12];
        for n in 1..12usize {
            for k in 1..=n {
                let position = k as f64 / (n + 1) as f64;
                pluck(position, 0.8, 0.0, &mut amplitudes);
                assert!(
                    amplitudes[n].abs() < 1e-12,
                    "harmonic {n} at position {position}: {}",
                    amplitudes[n]
                );
            }
        }
    }

    #[test]
    fn test_centre_pluck_has_only_odd_harmonics() {
        let mut amplitudes = [0.0; 6];
        pluck(0.5, 1.0, 0.0, &mut amplitudes);
        for (i, amplitude) in amplitudes.iter().enumerate() {
            if i % 2 == 1 {
                assert!(amplitude.abs() < 1e-12);
            } else {
                assert!(amplitude.abs() > 1e-3);
            }
        }
    }

    #[test]
    fn test_amplitude_scales_with_intensity() {
        let mut soft = [0.0; 4];
        let mut hard = [0.0; 4];
        pluck(0.15, 0.25, 0.0, &mut soft);
        pluck(0.15, 0.5, 0.0, &mut hard);
        for (s, h) in soft.iter().zip(hard.iter()) {
            assert!((2.0 * s - h).abs() < 1e-12);
        }
    }

    #[test]
    fn test_brightness_boosts_upper_harmonics() {
        let mut plain = [0.0; 5];
        let mut bright = [0.0; 5];
        pluck(0.15, 1.0, 0.0, &mut plain);
        pluck(0.15, 1.0, 1.0, &mut bright);
        assert_eq!(plain[0], bright[0]);
        for i in 1..5 {
            let ratio = bright[i] / plain[i];
            assert!((ratio - (i + 1) as f64).abs() < 1e-9, "harmonic {i}: {ratio}");
        }
    }
}
