//! Ring buffer reader that yields fixed-size analysis frames.

use ringbuf::traits::{Consumer, Observer};

use crate::format::FormatConverter;

/// Minimum raw read size in frames.
const MIN_READ_FRAMES: usize = 1024;

/// Result of one [`FrameReader::fill`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Filled {
    /// Converted samples added.
    pub samples: usize,
    /// True if any added sample was non-zero.
    pub audible: bool,
}

/// Pulls device audio out of the ring buffer and hands it out in exact
/// `buffer_size` mono frames at the analysis rate.
///
/// Only whole device frames are popped, so interleaving never tears. All
/// buffers are allocated up front and reused.
pub struct FrameReader {
    consumer: ringbuf::HeapCons<f32>,
    converter: FormatConverter,
    raw: Vec<f32>,
    pending: Vec<f32>,
    start: usize,
    buffer_size: usize,
    samples_read: u64,
}

impl FrameReader {
    /// Creates a reader over `consumer`, converting with `converter`.
    pub fn new(
        consumer: ringbuf::HeapCons<f32>,
        converter: FormatConverter,
        buffer_size: usize,
    ) -> Self {
        let channels = converter.channels();
        let buffer_size = buffer_size.max(1);
        let read_frames = buffer_size.max(MIN_READ_FRAMES);
        Self {
            consumer,
            converter,
            raw: vec![0.0; read_frames.saturating_mul(channels)],
            pending: Vec::with_capacity(read_frames.saturating_mul(4)),
            start: 0,
            buffer_size,
            samples_read: 0,
        }
    }

    /// Moves everything currently in the ring buffer into the pending queue.
    pub fn fill(&mut self) -> Filled {
        if self.start > 0 {
            self.pending.drain(..self.start);
            self.start = 0;
        }

        let channels = self.converter.channels();
        let before = self.pending.len();

        loop {
            let whole = self.consumer.occupied_len() / channels * channels;
            if whole == 0 {
                break;
            }
            let n = whole.min(self.raw.len());
            let popped = self.consumer.pop_slice(&mut self.raw[..n]);
            if popped == 0 {
                break;
            }
            self.samples_read += popped as u64;
            self.converter.process(&self.raw[..popped], &mut self.pending);
        }

        let added = &self.pending[before..];
        Filled {
            samples: added.len(),
            audible: added.iter().any(|&s| s != 0.0),
        }
    }

    /// Returns the next full analysis frame, if one is buffered.
    pub fn next_frame(&mut self) -> Option<&[f32]> {
        if self.pending.len() - self.start < self.buffer_size {
            return None;
        }
        let frame_start = self.start;
        self.start += self.buffer_size;
        Some(&self.pending[frame_start..self.start])
    }

    /// Converted samples waiting to form a frame.
    pub fn available(&self) -> usize {
        self.pending.len() - self.start
    }

    /// Raw device samples read from the ring buffer so far.
    pub fn samples_read(&self) -> u64 {
        self.samples_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::{Producer, Split};
    use ringbuf::HeapRb;

    fn reader(channels: u16, buffer_size: usize) -> (ringbuf::HeapProd<f32>, FrameReader) {
        let (producer, consumer) = HeapRb::<f32>::new(8192).split();
        let converter = FormatConverter::new(44_100, channels, 44_100);
        (producer, FrameReader::new(consumer, converter, buffer_size))
    }

    #[test]
    fn test_exact_frames() {
        let (mut producer, mut reader) = reader(1, 4);
        let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();
        producer.push_slice(&samples);

        let filled = reader.fill();
        assert_eq!(filled.samples, 10);
        assert!(filled.audible);

        assert_eq!(reader.next_frame(), Some(&[0.0, 1.0, 2.0, 3.0][..]));
        assert_eq!(reader.next_frame(), Some(&[4.0, 5.0, 6.0, 7.0][..]));
        assert_eq!(reader.next_frame(), None);
        assert_eq!(reader.available(), 2);
    }

    #[test]
    fn test_remainder_carries_over() {
        let (mut producer, mut reader) = reader(1, 4);
        producer.push_slice(&[1.0, 2.0, 3.0]);
        reader.fill();
        assert_eq!(reader.next_frame(), None);

        producer.push_slice(&[4.0, 5.0]);
        reader.fill();
        assert_eq!(reader.next_frame(), Some(&[1.0, 2.0, 3.0, 4.0][..]));
        assert_eq!(reader.available(), 1);
    }

    #[test]
    fn test_partial_device_frame_left_in_ring() {
        let (mut producer, mut reader) = reader(2, 2);
        // Two whole stereo frames plus a dangling left sample
        producer.push_slice(&[0.2, 0.4, 0.6, 0.8, 1.0]);
        reader.fill();
        assert_eq!(reader.samples_read(), 4);
        assert_eq!(reader.available(), 2);

        producer.push_slice(&[1.0]);
        reader.fill();
        assert_eq!(reader.samples_read(), 6);
        assert_eq!(reader.available(), 3);
    }

    #[test]
    fn test_silence_not_audible() {
        let (mut producer, mut reader) = reader(1, 4);
        producer.push_slice(&[0.0; 16]);
        assert!(!reader.fill().audible);
        assert_eq!(reader.fill(), Filled::default());
    }
}
