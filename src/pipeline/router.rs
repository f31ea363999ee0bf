//! Destination registry: fans each beat out to every sink.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::sink::BeatSink;
use crate::{BeatEvent, BeatOscError, ConfigError, EventCallback, PipelineEvent, SendError};

/// Command sent to the registry task.
pub enum RegistryCommand {
    /// Deliver queued beats, stop the sinks and exit.
    Stop,
}

/// The set of sinks a beat is delivered to.
///
/// Every beat goes to every sink concurrently. A failed send is logged,
/// counted and reported as [`PipelineEvent::SendFailed`]; it is never
/// retried and never affects the other sinks.
#[derive(Clone)]
pub struct DestinationRegistry {
    sinks: Vec<Arc<dyn BeatSink>>,
    event_callback: Option<EventCallback>,
    send_failures: Arc<AtomicU64>,
}

impl DestinationRegistry {
    /// Creates a registry over `sinks`.
    pub fn new(sinks: Vec<Arc<dyn BeatSink>>) -> Self {
        Self {
            sinks,
            event_callback: None,
            send_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Sets the event callback.
    pub fn with_event_callback(mut self, callback: Option<EventCallback>) -> Self {
        self.event_callback = callback;
        self
    }

    /// Number of registered sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// True if no sinks are registered.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Shared counter of failed sends.
    pub fn send_failures(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.send_failures)
    }

    fn emit_event(&self, event: PipelineEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }

    async fn send_to_sink(&self, sink: &Arc<dyn BeatSink>, beat: &BeatEvent) {
        if let Err(e) = sink.send(beat).await {
            self.send_failures.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(destination = sink.name(), error = %e, "beat not delivered");
            self.emit_event(PipelineEvent::SendFailed {
                destination: sink.name().to_string(),
                error: e.to_string(),
            });
        }
    }

    /// Sends one beat to all sinks concurrently.
    pub async fn broadcast(&self, beat: &BeatEvent) {
        let futures: Vec<_> = self
            .sinks
            .iter()
            .map(|sink| self.send_to_sink(sink, beat))
            .collect();

        futures::future::join_all(futures).await;
    }

    /// Starts all sinks in registration order.
    ///
    /// Returns an error if any sink fails to start. Sinks that already
    /// started are left running; the caller stops them.
    pub async fn start_sinks(&self) -> Result<(), BeatOscError> {
        for sink in &self.sinks {
            sink.on_start().await.map_err(|e| match e {
                SendError::Unresolved { host, reason } => {
                    BeatOscError::Configuration(ConfigError::UnresolvableHost { host, reason })
                }
                other => BeatOscError::DestinationStartFailed {
                    destination: sink.name().to_string(),
                    reason: other.to_string(),
                },
            })?;
        }
        Ok(())
    }

    /// Stops all sinks.
    pub async fn stop_sinks(&self) {
        for sink in &self.sinks {
            if let Err(e) = sink.on_stop().await {
                tracing::debug!(destination = sink.name(), error = %e, "sink stop failed");
                self.emit_event(PipelineEvent::SendFailed {
                    destination: sink.name().to_string(),
                    error: format!("Error during shutdown: {e}"),
                });
            }
        }
    }

    /// Runs the registry, delivering beats until told to stop.
    ///
    /// This is the main entry point for the registry task.
    pub async fn run(
        self,
        mut beat_rx: mpsc::Receiver<BeatEvent>,
        mut cmd_rx: mpsc::Receiver<RegistryCommand>,
    ) {
        loop {
            tokio::select! {
                Some(beat) = beat_rx.recv() => {
                    self.broadcast(&beat).await;
                }
                Some(cmd) = cmd_rx.recv() => {
                    match cmd {
                        RegistryCommand::Stop => {
                            while let Ok(beat) = beat_rx.try_recv() {
                                self.broadcast(&beat).await;
                            }
                            break;
                        }
                    }
                }
                else => break,
            }
        }

        self.stop_sinks().await;
    }
}
