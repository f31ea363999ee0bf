//! Tokio mpsc channel sink implementation.

use crate::sink::BeatSink;
use crate::{BeatEvent, SendError};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A sink that forwards beats to a tokio mpsc channel.
///
/// Useful for driving application logic (or tests) from detected beats.
/// Sending never waits: if the channel is full the beat is dropped and
/// reported as a send failure.
///
/// # Example
///
/// ```
/// use beat_osc::{BeatEvent, ChannelSink};
/// use tokio::sync::mpsc;
///
/// let (tx, mut rx) = mpsc::channel::<BeatEvent>(16);
/// let sink = ChannelSink::new(tx);
///
/// // Use sink with the pipeline builder...
/// // Then receive beats:
/// // while let Some(beat) = rx.recv().await { ... }
/// ```
pub struct ChannelSink {
    name: String,
    sender: mpsc::Sender<BeatEvent>,
}

impl ChannelSink {
    /// Creates a new channel sink with the given sender.
    pub fn new(sender: mpsc::Sender<BeatEvent>) -> Self {
        Self {
            name: "channel".to_string(),
            sender,
        }
    }

    /// Creates a new channel sink with a custom name.
    pub fn with_name(name: impl Into<String>, sender: mpsc::Sender<BeatEvent>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }
}

#[async_trait]
impl BeatSink for ChannelSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, beat: &BeatEvent) -> Result<(), SendError> {
        self.sender.try_send(*beat).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_sends_beats() {
        let (tx, mut rx) = mpsc::channel::<BeatEvent>(10);
        let sink = ChannelSink::new(tx);

        sink.send(&BeatEvent::new(128.0, 3)).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received, BeatEvent::new(128.0, 3));
    }

    #[tokio::test]
    async fn test_channel_sink_full() {
        let (tx, _rx) = mpsc::channel::<BeatEvent>(1);
        let sink = ChannelSink::new(tx);

        sink.send(&BeatEvent::new(100.0, 0)).await.unwrap();
        let result = sink.send(&BeatEvent::new(100.0, 1)).await;
        assert!(matches!(result, Err(SendError::ChannelFull)));
    }

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (tx, rx) = mpsc::channel::<BeatEvent>(10);
        let sink = ChannelSink::new(tx);
        drop(rx);

        let result = sink.send(&BeatEvent::new(100.0, 0)).await;
        assert!(matches!(result, Err(SendError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_channel_sink_custom_name() {
        let (tx, _rx) = mpsc::channel::<BeatEvent>(10);
        let sink = ChannelSink::with_name("lights", tx);
        assert_eq!(sink.name(), "lights");
    }
}
