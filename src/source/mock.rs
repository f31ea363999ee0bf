//! Mock audio source for testing without hardware.

use ringbuf::traits::{Producer, Split};
use ringbuf::HeapRb;
use std::time::Duration;

/// Length of one generated click in frames.
const CLICK_FRAMES: usize = 64;
const CLICK_FREQUENCY: f64 = 2_000.0;

/// A mock audio source that generates synthetic audio for testing.
///
/// This allows testing the full pipeline without requiring actual
/// audio hardware, making it suitable for CI environments.
///
/// # Example
///
/// ```
/// use beat_osc::source::MockSource;
///
/// let mut mock = MockSource::standard();
///
/// // 100ms of silence, then two seconds of clicks at 120 BPM
/// mock.generate_silence(100);
/// mock.generate_clicks(120.0, 2_000);
///
/// let samples = mock.take_samples();
/// assert_eq!(samples.len(), 4_410 + 88_200);
/// ```
pub struct MockSource {
    sample_rate: u32,
    channels: u16,
    samples: Vec<f32>,
}

impl MockSource {
    /// Creates a new mock source with the given format.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            samples: Vec::new(),
        }
    }

    /// Creates a mock source in the analysis format (44.1kHz mono).
    pub fn standard() -> Self {
        Self::new(crate::SAMPLE_RATE, 1)
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Generates silence for the given duration in milliseconds.
    pub fn generate_silence(&mut self, duration_ms: u64) {
        let num_samples = self.frames_for_duration(duration_ms) * usize::from(self.channels);
        self.samples.resize(self.samples.len() + num_samples, 0.0);
    }

    /// Generates a sine wave at the given frequency for the given duration.
    pub fn generate_sine(&mut self, frequency: f64, duration_ms: u64) {
        let sample_rate = f64::from(self.sample_rate);
        for i in 0..self.frames_for_duration(duration_ms) {
            let t = i as f64 / sample_rate;
            let value = (2.0 * std::f64::consts::PI * frequency * t).sin() as f32;
            self.push_frame(value * 0.5);
        }
    }

    /// Generates a click track: a short decaying tone burst every beat.
    ///
    /// The first click starts at the beginning of the generated span.
    pub fn generate_clicks(&mut self, bpm: f64, duration_ms: u64) {
        let frames = self.frames_for_duration(duration_ms);
        let sample_rate = f64::from(self.sample_rate);
        let period = 60.0 / bpm.max(1.0) * sample_rate;

        let mut beat = 0u64;
        let mut click_start = 0usize;
        let mut next_click = 0usize;
        for i in 0..frames {
            if i >= next_click {
                click_start = i;
                beat += 1;
                next_click = (beat as f64 * period).round() as usize;
            }
            let since = i - click_start;
            let value = if since < CLICK_FRAMES {
                let envelope = 1.0 - since as f64 / CLICK_FRAMES as f64;
                let t = since as f64 / sample_rate;
                (envelope * (2.0 * std::f64::consts::PI * CLICK_FREQUENCY * t).sin()) as f32
            } else {
                0.0
            };
            self.push_frame(value);
        }
    }

    /// Adds raw interleaved samples directly.
    pub fn add_samples(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
    }

    /// Takes all accumulated samples, clearing the internal buffer.
    pub fn take_samples(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.samples)
    }

    /// Returns a reference to the accumulated samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Returns the duration of accumulated samples.
    pub fn duration(&self) -> Duration {
        let frames = self.samples.len() / usize::from(self.channels);
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }

    /// Creates a ring buffer consumer filled with the accumulated samples.
    ///
    /// This is useful for driving the pipeline with mock data.
    pub fn into_ring_buffer(self) -> ringbuf::HeapCons<f32> {
        let capacity = self.samples.len().max(1024);
        let ring_buffer = HeapRb::<f32>::new(capacity);
        let (mut producer, consumer) = ring_buffer.split();
        producer.push_slice(&self.samples);
        consumer
    }

    fn push_frame(&mut self, value: f32) {
        for _ in 0..self.channels {
            self.samples.push(value);
        }
    }

    fn frames_for_duration(&self, duration_ms: u64) -> usize {
        (u64::from(self.sample_rate) * duration_ms / 1000) as usize
    }
}
