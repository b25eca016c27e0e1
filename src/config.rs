use crate::note::{string_for_note, Note};
use crate::string::physics::DEFAULT_INHARMONICITY;
use crate::string::{InvalidConfiguration, PhysicalProperties, MAX_HARMONICS};
use crate::synth::AdsrParams;
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Failure to load a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config load/parse error: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] InvalidConfiguration),
}

/// Configuration of a single string.
///
/// Loaded from YAML, TOML or JSON; any field left out takes its default.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct StringConfig {
    /// Vibrating length in metres.
    pub length: f64,
    /// Mass per unit length in kg/m.
    pub linear_density: f64,
    /// Tension in newtons.
    pub tension: f64,
    /// Number of harmonics to synthesize.
    pub harmonics: usize,
    /// Damping coefficient. Higher harmonics are damped in proportion to `n²`.
    pub damping: f64,
    /// Output gain between 0 and 1.
    pub master_volume: f64,
    /// Where the string is plucked, as a fraction of its length.
    pub pinch_position: f64,
    /// Baseline pluck intensity, used when a pinch gives none.
    pub pinch_intensity: f64,
    pub min_intensity: f64,
    pub max_intensity: f64,
    /// Stiffness coefficient stretching upper partials sharp.
    pub inharmonicity: f64,
    /// How strongly harder plucks brighten the timbre. Zero disables.
    pub brightness: f64,
    /// Envelope used when `frequency_mapped_envelope` is off.
    pub envelope: AdsrParams,
    /// Derive the envelope from the fundamental instead of using `envelope`.
    pub frequency_mapped_envelope: bool,
    /// Publish a harmonic snapshot for a waveform renderer on each pluck.
    pub visualization: bool,
    /// Capacity of the control-to-audio command queue.
    pub command_capacity: usize,
}

impl Default for StringConfig {
    fn default() -> Self {
        Self {
            length: 0.65,
            linear_density: 0.00738,
            tension: 86.0,
            harmonics: 3,
            damping: 0.5,
            master_volume: 1.0,
            pinch_position: 0.15,
            pinch_intensity: 0.5,
            min_intensity: 0.05,
            max_intensity: 1.0,
            inharmonicity: DEFAULT_INHARMONICITY,
            brightness: 0.0,
            envelope: AdsrParams::default(),
            frequency_mapped_envelope: true,
            visualization: false,
            command_capacity: 64,
        }
    }
}

impl StringConfig {
    /// Parses and validates a configuration file.
    pub fn load(path: &Path) -> Result<StringConfig, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<StringConfig>()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), InvalidConfiguration> {
        self.properties().validate()?;
        validate_harmonics(self.harmonics)?;
        InvalidConfiguration::check_range("damping", self.damping, 0.0, f64::MAX)?;
        InvalidConfiguration::check_range("master volume", self.master_volume, 0.0, 1.0)?;
        InvalidConfiguration::check_range("minimum intensity", self.min_intensity, 0.0, 1.0)?;
        InvalidConfiguration::check_range("maximum intensity", self.max_intensity, self.min_intensity, 1.0)?;
        InvalidConfiguration::check_range("inharmonicity", self.inharmonicity, 0.0, 0.01)?;
        InvalidConfiguration::check_range("brightness", self.brightness, 0.0, 4.0)?;
        if !(self.pinch_position > 0.0 && self.pinch_position < 1.0) {
            return Err(InvalidConfiguration::OutOfRange {
                name: "pinch position",
                value: self.pinch_position,
                min: 0.0,
                max: 1.0,
            });
        }
        if self.command_capacity == 0 {
            return Err(InvalidConfiguration::OutOfRange {
                name: "command capacity",
                value: 0.0,
                min: 1.0,
                max: f64::MAX,
            });
        }
        self.envelope.validate()
    }

    pub fn properties(&self) -> PhysicalProperties {
        PhysicalProperties {
            length: self.length,
            linear_density: self.linear_density,
            tension: self.tension,
        }
    }

    pub fn with_properties(mut self, properties: PhysicalProperties) -> Self {
        self.length = properties.length;
        self.linear_density = properties.linear_density;
        self.tension = properties.tension;
        self
    }

    /// Tunes the string to `note` using typical piano string dimensions.
    pub fn with_note(self, note: Note) -> Self {
        self.with_properties(string_for_note(note).properties)
    }

    /// The envelope to use for a string with the given fundamental.
    pub fn envelope_for(&self, fundamental: f64) -> AdsrParams {
        if self.frequency_mapped_envelope {
            AdsrParams::for_frequency(fundamental)
        } else {
            self.envelope
        }
    }
}

pub(crate) fn validate_harmonics(count: usize) -> Result<(), InvalidConfiguration> {
    if (1..=MAX_HARMONICS).contains(&count) {
        Ok(())
    } else {
        Err(InvalidConfiguration::HarmonicsCount {
            count,
            max: MAX_HARMONICS,
        })
    }
}
