//! Sample format and channel conversion.

/// Converts i16 samples to f32.
///
/// Output will be in the range [-1.0, 1.0).
#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / 32768.0
}

/// Converts unsigned 16-bit samples (midpoint 32768) to f32.
#[inline]
pub fn u16_to_f32(sample: u16) -> f32 {
    (f32::from(sample) - 32768.0) / 32768.0
}

/// Downmixes interleaved frames to mono by averaging channels, appending to `out`.
///
/// A trailing partial frame is ignored. With one channel this is a copy.
pub fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }

    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i16_to_f32_full_range() {
        let max = i16_to_f32(32767);
        assert!((max - 0.99997).abs() < 0.001);

        let min = i16_to_f32(-32768);
        assert!((min - (-1.0)).abs() < 0.001);

        assert_eq!(i16_to_f32(0), 0.0);
    }

    #[test]
    fn test_u16_midpoint_is_silence() {
        assert_eq!(u16_to_f32(32768), 0.0);
        assert!((u16_to_f32(0) - (-1.0)).abs() < 1e-6);
        assert!(u16_to_f32(u16::MAX) > 0.999);
    }

    #[test]
    fn test_downmix_stereo() {
        let mut mono = Vec::new();
        downmix_into(&[0.2, 0.4, -0.5, 0.5], 2, &mut mono);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert_eq!(mono[1], 0.0);
    }

    #[test]
    fn test_downmix_ignores_partial_frame() {
        let mut mono = Vec::new();
        downmix_into(&[0.1, 0.1, 0.1, 0.9, 0.9], 3, &mut mono);
        assert_eq!(mono.len(), 1);
    }

    #[test]
    fn test_downmix_mono_is_copy() {
        let mut out = vec![1.0];
        downmix_into(&[0.5, -0.5], 1, &mut out);
        assert_eq!(out, vec![1.0, 0.5, -0.5]);
    }
}
