/// Copies a mono signal into every channel of an interleaved frame buffer.
///
/// Writes `min(mono.len(), output.len() / channels)` frames.
pub fn mono_to_interleaved(mono: &[f32], output: &mut [f32], channels: usize) {
    if channels == 0 {
        return;
    }
    for (frame, &sample) in output.chunks_exact_mut(channels).zip(mono.iter()) {
        frame.fill(sample);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mono_to_stereo() {
        let mut output = [0.0; 6];
        mono_to_interleaved(&[0.1, 0.2, 0.3], &mut output, 2);
        assert_eq!(output, [0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn test_mono_passthrough() {
        let mut output = [0.0; 2];
        mono_to_interleaved(&[0.5, -0.5], &mut output, 1);
        assert_eq!(output, [0.5, -0.5]);
    }

    #[test]
    fn test_short_input_leaves_tail() {
        let mut output = [9.0; 4];
        mono_to_interleaved(&[1.0], &mut output, 2);
        assert_eq!(output, [1.0, 1.0, 9.0, 9.0]);
    }
}
