use crate::config::StringConfig;
use crate::string::InvalidConfiguration;
use crate::synth::StringSynth;
use basedrop::Collector;
use std::path::Path;
use thiserror::Error;
use tracing::info;

const BLOCK_FRAMES: usize = 256;

/// How a single pluck is rendered offline.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderOptions {
    pub sample_rate: u32,
    /// Seconds between the pinch and its release.
    pub hold: f64,
    /// Total length of the render in seconds.
    pub duration: f64,
    /// Hold the sustain pedal down for the whole render.
    pub pedal: bool,
    /// Pluck intensity; the configured baseline when `None`.
    pub intensity: Option<f64>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            hold: 1.0,
            duration: 4.0,
            pedal: false,
            intensity: None,
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> Result<(), InvalidConfiguration> {
        InvalidConfiguration::check_range("sample rate", self.sample_rate as f64, 1.0, 384_000.0)?;
        InvalidConfiguration::check_range("duration", self.duration, 0.0, 3600.0)?;
        InvalidConfiguration::check_range("hold", self.hold, 0.0, f64::MAX)
    }
}

/// Plucks a string, releases it after `hold` seconds and returns the mono output.
pub fn render_pluck(config: &StringConfig, options: &RenderOptions) -> Result<Vec<f32>, InvalidConfiguration> {
    options.validate()?;

    let collector = Collector::new();
    let (mut synth, mut voice) = StringSynth::new(config, &collector.handle())?;

    let sample_rate = options.sample_rate;
    let total = (options.duration * sample_rate as f64).round() as usize;
    let held = ((options.hold * sample_rate as f64).round() as usize).min(total);
    let mut samples = vec![0.0f32; total];

    if options.pedal {
        synth.set_sustain_pedal(true);
    }
    match options.intensity {
        Some(intensity) => synth.pinch_with(intensity),
        None => synth.pinch(),
    }

    let (attack, tail) = samples.split_at_mut(held);
    for block in attack.chunks_mut(BLOCK_FRAMES) {
        voice.fill(block, sample_rate);
    }
    synth.stop_pinch();
    for block in tail.chunks_mut(BLOCK_FRAMES) {
        voice.fill(block, sample_rate);
    }

    info!(
        fundamental = synth.fundamental(),
        frames = total,
        sample_rate,
        "Rendered pluck"
    );
    Ok(samples)
}

/// Writes mono samples to a 32-bit float WAV file.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), RenderError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut wav = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        wav.write_sample(sample)?;
    }
    wav.finalize()?;
    Ok(())
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    IoError(std::io::Error),
    #[error("WAV error: {0}")]
    Wav(hound::Error),
    #[error("invalid configuration: {0}")]
    Configuration(#[from] InvalidConfiguration),
}

impl From<hound::Error> for RenderError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(inner) => RenderError::IoError(inner),
            other => RenderError::Wav(other),
        }
    }
}
