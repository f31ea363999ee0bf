//! Streaming sample rate conversion.
//!
//! Linear interpolation, with the fractional read position and the last
//! input sample carried between blocks so a stream can be converted in
//! arbitrary slices without seams.

/// Stateful linear resampler for a mono stream.
#[derive(Debug, Clone)]
pub struct Resampler {
    step: f64,
    /// Read position; index 0 refers to `last`, 1.. to the current block.
    position: f64,
    last: f32,
}

impl Resampler {
    /// Creates a resampler from `from_rate` to `to_rate` (both non-zero).
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        Self {
            step: f64::from(from_rate.max(1)) / f64::from(to_rate.max(1)),
            position: 1.0,
            last: 0.0,
        }
    }

    /// True if the rates are equal and samples pass through unchanged.
    pub fn is_passthrough(&self) -> bool {
        (self.step - 1.0).abs() < f64::EPSILON
    }

    /// Resamples one block, appending output to `out`.
    pub fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
        if input.is_empty() {
            return;
        }
        if self.is_passthrough() {
            out.extend_from_slice(input);
            return;
        }

        let n = input.len();
        let last = self.last;
        let at = |i: usize| if i == 0 { last } else { input[i - 1] };

        while (self.position.floor() as usize) < n {
            let index = self.position.floor() as usize;
            let frac = (self.position - index as f64) as f32;
            let a = at(index);
            let b = at(index + 1);
            out.push(a + (b - a) * frac);
            self.position += self.step;
        }

        self.position -= n as f64;
        self.last = input[n - 1];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resample_all(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
        let mut resampler = Resampler::new(from, to);
        let mut out = Vec::new();
        resampler.process(samples, &mut out);
        out
    }

    #[test]
    fn test_same_rate_passthrough() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_all(&samples, 44_100, 44_100), samples);
    }

    #[test]
    fn test_empty_input() {
        assert!(resample_all(&[], 48_000, 44_100).is_empty());
    }

    #[test]
    fn test_downsample_length() {
        // 2:1, 480 in -> 240 out
        let samples: Vec<f32> = (0..480).map(|i| i as f32).collect();
        let out = resample_all(&samples, 88_200, 44_100);
        assert_eq!(out.len(), 240);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 2.0);
    }

    #[test]
    fn test_upsample_interpolates() {
        // The final sample is held back until the next block arrives
        let out = resample_all(&[0.0, 1.0, 2.0], 1, 2);
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_split_blocks_match_whole() {
        let samples: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.01).sin()).collect();
        let whole = resample_all(&samples, 48_000, 44_100);

        let mut resampler = Resampler::new(48_000, 44_100);
        let mut split = Vec::new();
        for block in samples.chunks(37) {
            resampler.process(block, &mut split);
        }

        assert_eq!(whole.len(), split.len());
        for (a, b) in whole.iter().zip(&split) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_long_stream_rate() {
        let mut resampler = Resampler::new(48_000, 44_100);
        let mut out = Vec::new();
        for _ in 0..100 {
            resampler.process(&[0.0; 480], &mut out);
        }
        // 48000 in -> ~44100 out
        assert!((out.len() as i64 - 44_100).abs() <= 1);
    }
}
