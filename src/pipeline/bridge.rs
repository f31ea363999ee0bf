//! Beat bridge task - reads analysis frames, runs the estimator, forwards beats.
//!
//! Responsibilities:
//! - Draining the ring buffer into fixed-size frames at the analysis rate
//! - Feeding every frame, in order, to the estimator
//! - Printing verbose feedback and forwarding beats to the registry
//! - Reporting overflow and audio flow changes as events
//! - Stopping analysis and reporting when the estimator faults

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::capture::PipelineState;
use crate::estimator::EstimatorAdapter;
use crate::event::EventCallback;
use crate::feedback::BeatPrinter;
use crate::pipeline::FrameReader;
use crate::{BeatEvent, EstimatorFault, PipelineEvent};

/// Frames between debug progress lines.
const PROGRESS_EVERY: u64 = 2_000;

/// Detects when the input stops delivering anything but silence.
struct FlowMonitor {
    last_audio_time: Instant,
    is_flowing: bool,
    threshold: Duration,
}

impl FlowMonitor {
    fn new(threshold: Duration) -> Self {
        Self {
            last_audio_time: Instant::now(),
            is_flowing: true,
            threshold,
        }
    }

    /// Returns an event to emit if the flow state changed.
    fn update(&mut self, audible: bool) -> Option<PipelineEvent> {
        if audible {
            let was_stopped = !self.is_flowing;
            self.last_audio_time = Instant::now();
            self.is_flowing = true;
            return was_stopped.then_some(PipelineEvent::AudioFlowResumed);
        }

        let silent_for = self.last_audio_time.elapsed();
        if self.is_flowing && silent_for > self.threshold {
            self.is_flowing = false;
            return Some(PipelineEvent::AudioFlowStopped {
                silent_duration_ms: silent_for.as_millis() as u64,
            });
        }
        None
    }
}

/// Everything the bridge needs besides the frame source and estimator.
pub struct BridgeConfig {
    /// Real-time duration of one analysis buffer.
    pub buffer_duration: Duration,
    /// Silence that counts as the input having stopped.
    pub silence_threshold: Duration,
    /// Print a line per beat.
    pub verbose: bool,
}

/// Reads analysis frames, runs the estimator and forwards beats.
pub struct BeatBridge {
    reader: FrameReader,
    adapter: EstimatorAdapter,
    beat_tx: mpsc::Sender<BeatEvent>,
    fault_tx: Option<oneshot::Sender<EstimatorFault>>,
    state: Arc<PipelineState>,
    printer: Option<BeatPrinter>,
    flow_monitor: FlowMonitor,
    event_callback: Option<EventCallback>,
    poll_interval: Duration,
    overflow_reported: u64,
}

impl BeatBridge {
    /// Creates a new bridge.
    pub fn new(
        reader: FrameReader,
        adapter: EstimatorAdapter,
        config: &BridgeConfig,
        beat_tx: mpsc::Sender<BeatEvent>,
        fault_tx: oneshot::Sender<EstimatorFault>,
        state: Arc<PipelineState>,
        event_callback: Option<EventCallback>,
    ) -> Self {
        // Poll at half the buffer duration so frames never wait a full period
        let poll_interval = (config.buffer_duration / 2).max(Duration::from_millis(1));

        tracing::info!(
            hop_size = adapter.params().hop_size,
            window_size = adapter.params().window_size,
            poll_interval = ?poll_interval,
            verbose = config.verbose,
            "beat bridge starting"
        );

        Self {
            reader,
            adapter,
            beat_tx,
            fault_tx: Some(fault_tx),
            state,
            printer: config.verbose.then(BeatPrinter::stdout),
            flow_monitor: FlowMonitor::new(config.silence_threshold),
            event_callback,
            poll_interval,
            overflow_reported: 0,
        }
    }

    /// Runs until the running flag clears, the registry goes away, or the
    /// estimator faults.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.state.running.load(Ordering::SeqCst) {
            interval.tick().await;
            self.check_overflow();

            match self.process_available().await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!("beat channel closed, bridge exiting");
                    return;
                }
                Err(fault) => {
                    self.on_fault(fault);
                    return;
                }
            }
        }

        tracing::debug!(
            buffers = self.adapter.buffers_analyzed(),
            samples_read = self.reader.samples_read(),
            "beat bridge stopped"
        );
    }

    /// Analyzes every complete frame currently available.
    ///
    /// Returns `Ok(false)` if the beat channel has closed.
    async fn process_available(&mut self) -> Result<bool, EstimatorFault> {
        let filled = self.reader.fill();
        self.state
            .samples_captured
            .fetch_add(filled.samples as u64, Ordering::Relaxed);
        if let Some(event) = self.flow_monitor.update(filled.audible) {
            self.emit_event(event);
        }

        while let Some(frame) = self.reader.next_frame() {
            let beat = self.adapter.process(frame)?;
            let analyzed = self.state.buffers_analyzed.fetch_add(1, Ordering::Relaxed) + 1;

            if analyzed % PROGRESS_EVERY == 0 {
                tracing::debug!(
                    buffers = analyzed,
                    beats = self.state.beats_detected.load(Ordering::Relaxed),
                    pending = self.reader.available(),
                    "analysis progress"
                );
            }

            if let Some(beat) = beat {
                if !self.deliver(beat).await {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    async fn deliver(&mut self, beat: BeatEvent) -> bool {
        self.state.beats_detected.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(tempo = beat.tempo_bpm, buffer = beat.buffer_index, "beat");

        if let Some(ref mut printer) = self.printer {
            if let Err(e) = printer.on_beat(beat.tempo_bpm) {
                tracing::warn!("Failed to print beat: {}", e);
            }
        }

        self.beat_tx.send(beat).await.is_ok()
    }

    fn check_overflow(&mut self) {
        let total = self.state.overflowed_samples.load(Ordering::Relaxed);
        if total > self.overflow_reported {
            let dropped_samples = total - self.overflow_reported;
            self.overflow_reported = total;
            tracing::warn!(dropped_samples, "analysis fell behind, audio dropped");
            self.emit_event(PipelineEvent::BufferOverflow { dropped_samples });
        }
    }

    fn on_fault(&mut self, fault: EstimatorFault) {
        tracing::error!(
            buffers = self.adapter.buffers_analyzed(),
            "Tempo estimator fault: {}",
            fault
        );
        self.emit_event(PipelineEvent::EstimatorFaulted {
            reason: fault.to_string(),
        });
        if let Some(tx) = self.fault_tx.take() {
            let _ = tx.send(fault);
        }
    }

    fn emit_event(&self, event: PipelineEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }
}

/// Spawns the beat bridge as a background task.
pub fn spawn_beat_bridge(bridge: BeatBridge) -> tokio::task::JoinHandle<()> {
    tokio::spawn(bridge.run())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_monitor_stop_and_resume() {
        let mut monitor = FlowMonitor::new(Duration::ZERO);
        assert!(monitor.update(true).is_none());

        std::thread::sleep(Duration::from_millis(2));
        assert!(matches!(
            monitor.update(false),
            Some(PipelineEvent::AudioFlowStopped { .. })
        ));
        // Only reported once
        assert!(monitor.update(false).is_none());

        assert!(matches!(
            monitor.update(true),
            Some(PipelineEvent::AudioFlowResumed)
        ));
    }

    #[test]
    fn test_flow_monitor_within_threshold() {
        let mut monitor = FlowMonitor::new(Duration::from_secs(60));
        assert!(monitor.update(false).is_none());
    }
}
