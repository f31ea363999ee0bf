//! Beat event produced by the analyzer.

/// A single detected beat with the tempo estimate at that moment.
///
/// `BeatEvent` is ephemeral: it is created when the estimator flags a beat,
/// handed to console feedback and the destination registry, then dropped.
///
/// # Example
///
/// ```
/// use beat_osc::BeatEvent;
///
/// let beat = BeatEvent::new(120.0, 5);
/// assert_eq!(beat.tempo_bpm, 120.0);
///
/// // Tempo is never negative
/// assert_eq!(BeatEvent::new(f32::NAN, 0).tempo_bpm, 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEvent {
    /// Estimated tempo in beats per minute, `>= 0`.
    pub tempo_bpm: f32,

    /// Zero-based index of the analysis buffer that produced this beat.
    pub buffer_index: u64,
}

impl BeatEvent {
    /// Creates a beat event, clamping negative or NaN tempo to zero.
    pub fn new(tempo_bpm: f32, buffer_index: u64) -> Self {
        Self {
            tempo_bpm: tempo_bpm.max(0.0),
            buffer_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_clamped() {
        assert_eq!(BeatEvent::new(-3.0, 0).tempo_bpm, 0.0);
        assert_eq!(BeatEvent::new(f32::NAN, 0).tempo_bpm, 0.0);
        assert_eq!(BeatEvent::new(128.5, 0).tempo_bpm, 128.5);
    }

    #[test]
    fn test_buffer_index_kept() {
        let beat = BeatEvent::new(90.0, 42);
        assert_eq!(beat.buffer_index, 42);
    }
}
