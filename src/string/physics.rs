use serde::Deserialize;
use thiserror::Error;

/// Inharmonicity of a typical steel string, used when none is configured.
pub const DEFAULT_INHARMONICITY: f64 = 1e-4;

/// A string configuration that must never reach the audio thread.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidConfiguration {
    #[error("string length must be positive, got {0} m")]
    Length(f64),
    #[error("linear density must be positive, got {0} kg/m")]
    LinearDensity(f64),
    #[error("tension must be positive, got {0} N")]
    Tension(f64),
    #[error("harmonic count must be between 1 and {max}, got {count}")]
    HarmonicsCount { count: usize, max: usize },
    #[error("{name} must be within {min}..={max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl InvalidConfiguration {
    /// Checks that `value` lies within `min..=max`, rejecting NaN.
    pub fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), Self> {
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(Self::OutOfRange { name, value, min, max })
        }
    }
}

/// The physical quantities that determine a string's pitch.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
pub struct PhysicalProperties {
    /// Vibrating length in metres.
    pub length: f64,
    /// Mass per unit length in kg/m.
    pub linear_density: f64,
    /// Tension in newtons.
    pub tension: f64,
}

impl PhysicalProperties {
    /// Creates a validated set of properties.
    pub fn new(length: f64, linear_density: f64, tension: f64) -> Result<Self, InvalidConfiguration> {
        let properties = Self {
            length,
            linear_density,
            tension,
        };
        properties.validate()?;
        Ok(properties)
    }

    pub fn validate(&self) -> Result<(), InvalidConfiguration> {
        if !is_positive(self.length) {
            return Err(InvalidConfiguration::Length(self.length));
        }
        if !is_positive(self.linear_density) {
            return Err(InvalidConfiguration::LinearDensity(self.linear_density));
        }
        if !is_positive(self.tension) {
            return Err(InvalidConfiguration::Tension(self.tension));
        }
        Ok(())
    }

    /// The fundamental frequency in Hz, `f0 = (1/2L)·√(T/μ)`.
    ///
    /// Only meaningful for validated properties.
    pub fn fundamental(&self) -> f64 {
        (self.tension / self.linear_density).sqrt() / (2.0 * self.length)
    }
}

/// Computes the fundamental frequency of a string, rejecting non-physical input.
pub fn compute_fundamental(length: f64, linear_density: f64, tension: f64) -> Result<f64, InvalidConfiguration> {
    Ok(PhysicalProperties::new(length, linear_density, tension)?.fundamental())
}

/// Fills `frequencies` with the first `frequencies.len()` partials of `fundamental`.
///
/// Partial `n = i + 1` sits at `f0·n·(1 + k·n²)`: stiffness pushes upper partials
/// slightly sharp, so a non-negative `inharmonicity` keeps the series strictly
/// increasing.
pub fn compute_harmonics(fundamental: f64, inharmonicity: f64, frequencies: &mut [f64]) {
    for (i, frequency) in frequencies.iter_mut().enumerate() {
        let n = (i + 1) as f64;
        *frequency = fundamental * n * (1.0 + inharmonicity * n * n);
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
