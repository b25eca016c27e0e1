use super::Processor;
use crate::convert::mono_to_interleaved;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BuildStreamError, DefaultStreamConfigError, Device, PauseStreamError, PlayStreamError, Stream,
    StreamConfig,
};
use thiserror::Error;
use tracing::{error, info};

/// Largest block handed to the processor at once. Longer device buffers are split.
const MAX_BLOCK_FRAMES: usize = 4096;

#[derive(Debug, Error)]
pub enum StreamUnavailable {
    #[error("no default output device")]
    NoDevice,
    #[error("could not query the output config: {0}")]
    DefaultConfig(#[from] DefaultStreamConfigError),
    #[error("could not build the output stream: {0}")]
    Build(#[from] BuildStreamError),
    #[error("could not start the output stream: {0}")]
    Play(#[from] PlayStreamError),
    #[error("could not pause the output stream: {0}")]
    Pause(#[from] PauseStreamError),
}

/// A cpal output stream driven by a mono [`Processor`].
///
/// The stream is created paused.
pub struct AudioOutput {
    stream: Stream,
    sample_rate: u32,
    channels: u16,
    playing: bool,
}

impl AudioOutput {
    /// Opens the default output device of the default host.
    pub fn open<P: Processor + 'static>(processor: P) -> Result<Self, StreamUnavailable> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(StreamUnavailable::NoDevice)?;
        let config = device.default_output_config()?;
        Self::from_cpal(&device, &config.config(), processor)
    }

    pub fn from_cpal<P: Processor + 'static>(
        device: &Device,
        config: &StreamConfig,
        mut processor: P,
    ) -> Result<Self, StreamUnavailable> {
        let sample_rate = config.sample_rate.0;
        let channels = config.channels.max(1);
        let stride = channels as usize;
        processor.set_sample_rate(sample_rate);

        let mut mono = vec![0.0f32; MAX_BLOCK_FRAMES];
        let stream = device.build_output_stream(
            config,
            move |data: &mut [f32], _| {
                for block in data.chunks_mut(MAX_BLOCK_FRAMES * stride) {
                    let mono = &mut mono[..block.len() / stride];
                    processor.process(mono);
                    mono_to_interleaved(mono, block, stride);
                }
            },
            move |err| {
                error!(%err, "An error occurred on the output stream");
            },
            None,
        )?;
        stream.pause()?;

        info!(device = %device.name().unwrap_or_default(), "Output stream ready");
        Ok(Self {
            stream,
            sample_rate,
            channels,
            playing: false,
        })
    }

    pub fn resume(&mut self) -> Result<(), StreamUnavailable> {
        if !self.playing {
            self.stream.play()?;
            self.playing = true;
        }
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), StreamUnavailable> {
        if self.playing {
            self.stream.pause()?;
            self.playing = false;
        }
        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}
