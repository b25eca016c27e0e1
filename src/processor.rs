pub use io::{AudioOutput, StreamUnavailable};

mod io;

pub trait Processor: Send {
    /// Provides the audio sample rate to the processor.
    /// This must be called before calling `process`, otherwise it produces silence.
    fn set_sample_rate(&mut self, sample_rate: u32);

    /// Renders the next block of mono audio, overwriting `audio_out`.
    fn process(&mut self, audio_out: &mut [f32]);
}
