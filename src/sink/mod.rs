//! Sink trait and implementations for beat destinations.
//!
//! A [`BeatSink`] is anything that can receive a [`BeatEvent`]. The crate
//! provides two built-in sinks:
//!
//! - [`OscSink`]: Sends an OSC message over UDP to one [`Destination`]
//! - [`ChannelSink`]: Forwards beats to a tokio mpsc channel
//!
//! You can implement the [`BeatSink`] trait for custom destinations.
//!
//! [`Destination`]: crate::Destination

mod channel;
mod osc;

pub use channel::ChannelSink;
pub use osc::{encode_beat, OscSink};

use crate::{BeatEvent, SendError};
use async_trait::async_trait;

/// A destination for beat events.
///
/// # Implementation Notes
///
/// - Methods take `&self` - use interior mutability (`Mutex`, atomics) if needed
/// - `on_start` is called before any beat is sent; open sockets here
/// - `send` must not wait on the network; a failure only costs this one beat
/// - `on_stop` is called during shutdown; release resources here
///
/// # Example
///
/// ```
/// use beat_osc::{BeatEvent, BeatSink, SendError};
/// use async_trait::async_trait;
///
/// struct PrintSink;
///
/// #[async_trait]
/// impl BeatSink for PrintSink {
///     fn name(&self) -> &str {
///         "print"
///     }
///
///     async fn send(&self, beat: &BeatEvent) -> Result<(), SendError> {
///         println!("beat at {:.1} BPM", beat.tempo_bpm);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait BeatSink: Send + Sync {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Called once before capture begins.
    ///
    /// Errors here are fatal and prevent the pipeline from starting.
    ///
    /// Default implementation does nothing.
    async fn on_start(&self) -> Result<(), SendError> {
        Ok(())
    }

    /// Delivers one beat. Failures are logged and never retried.
    async fn send(&self, beat: &BeatEvent) -> Result<(), SendError>;

    /// Called during shutdown, even if sends failed.
    ///
    /// Default implementation does nothing.
    async fn on_stop(&self) -> Result<(), SendError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink {
        count: AtomicUsize,
    }

    #[async_trait]
    impl BeatSink for CountingSink {
        fn name(&self) -> &str {
            "counting"
        }

        async fn send(&self, _beat: &BeatEvent) -> Result<(), SendError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sink_lifecycle() {
        let sink = CountingSink {
            count: AtomicUsize::new(0),
        };

        sink.on_start().await.unwrap();
        sink.send(&BeatEvent::new(120.0, 0)).await.unwrap();
        sink.send(&BeatEvent::new(121.0, 9)).await.unwrap();
        assert_eq!(sink.count.load(Ordering::SeqCst), 2);
        sink.on_stop().await.unwrap();
    }

    #[test]
    fn test_sink_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Arc<dyn BeatSink>>();
    }
}
