//! Audio format conversion utilities.
//!
//! The capture device may not deliver mono at 44.1 kHz. [`FormatConverter`]
//! downmixes and resamples whatever it delivers into the mono
//! [`SAMPLE_RATE`](crate::SAMPLE_RATE) stream the estimator expects.

mod convert;
mod resample;

pub use convert::{downmix_into, i16_to_f32, u16_to_f32};
pub use resample::Resampler;

/// Converts interleaved device audio to mono at the target rate.
///
/// Keeps a reusable scratch buffer, so steady-state conversion does not allocate.
#[derive(Debug, Clone)]
pub struct FormatConverter {
    channels: usize,
    resampler: Resampler,
    mono: Vec<f32>,
}

impl FormatConverter {
    /// Creates a converter for a device format.
    pub fn new(device_rate: u32, channels: u16, target_rate: u32) -> Self {
        Self {
            channels: usize::from(channels.max(1)),
            resampler: Resampler::new(device_rate, target_rate),
            mono: Vec::new(),
        }
    }

    /// Number of interleaved channels per device frame.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// True if the device already delivers the target format.
    pub fn is_passthrough(&self) -> bool {
        self.channels == 1 && self.resampler.is_passthrough()
    }

    /// Converts whole interleaved frames, appending mono samples to `out`.
    pub fn process(&mut self, interleaved: &[f32], out: &mut Vec<f32>) {
        if self.is_passthrough() {
            out.extend_from_slice(interleaved);
            return;
        }

        self.mono.clear();
        downmix_into(interleaved, self.channels, &mut self.mono);
        self.resampler.process(&self.mono, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        let mut converter = FormatConverter::new(44_100, 1, 44_100);
        assert!(converter.is_passthrough());

        let mut out = Vec::new();
        converter.process(&[0.1, 0.2], &mut out);
        assert_eq!(out, vec![0.1, 0.2]);
    }

    #[test]
    fn test_stereo_48k_to_mono_44k() {
        let mut converter = FormatConverter::new(48_000, 2, 44_100);
        assert!(!converter.is_passthrough());
        assert_eq!(converter.channels(), 2);

        let mut out = Vec::new();
        converter.process(&vec![0.5; 48_000 * 2], &mut out);
        assert!((out.len() as i64 - 44_100).abs() <= 1);
        assert!(out.iter().skip(1).all(|s| (s - 0.5).abs() < 1e-6));
    }
}
