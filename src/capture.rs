//! Capture pipeline lifecycle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::estimator::{EstimatorAdapter, EstimatorFactory};
use crate::format::FormatConverter;
use crate::pipeline::{
    spawn_beat_bridge, BeatBridge, BridgeConfig, DestinationRegistry, FrameReader,
    RegistryCommand,
};
use crate::source::{AudioDevice, CaptureStream, MockSource};
use crate::{
    BeatOscError, CaptureConfig, EstimatorFault, EventCallback, PipelineConfig, PipelineEvent,
    SAMPLE_RATE,
};

/// Channel capacity for registry commands.
/// Only need 1 since commands are rare (just Stop).
const COMMAND_CHANNEL_CAPACITY: usize = 1;

const ANALYSIS_ENDED: &str = "analysis task ended unexpectedly";

/// Counters describing a capture run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Analysis buffers handed to the estimator.
    pub buffers_analyzed: u64,
    /// Beats the estimator flagged.
    pub beats_detected: u64,
    /// Mono samples produced at the analysis rate.
    pub samples_captured: u64,
    /// Device samples dropped because the ring buffer was full.
    pub overflowed_samples: u64,
    /// Individual destination sends that failed.
    pub send_failures: u64,
}

/// Internal state shared between the pipeline and its background tasks.
pub(crate) struct PipelineState {
    pub running: AtomicBool,
    pub buffers_analyzed: AtomicU64,
    pub beats_detected: AtomicU64,
    pub samples_captured: AtomicU64,
    /// Shared with the audio callback.
    pub overflowed_samples: Arc<AtomicU64>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            buffers_analyzed: AtomicU64::new(0),
            beats_detected: AtomicU64::new(0),
            samples_captured: AtomicU64::new(0),
            overflowed_samples: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Handles owned only while capture is running.
struct RunningCapture {
    // Keep the capture stream alive - dropping it stops CPAL
    stream: Option<CaptureStream>,
    bridge_handle: JoinHandle<()>,
    registry_handle: JoinHandle<()>,
    registry_cmd_tx: mpsc::Sender<RegistryCommand>,
}

enum Phase {
    Stopped,
    Running(RunningCapture),
}

/// The capture → detect → fan-out pipeline.
///
/// Built by [`CapturePipelineBuilder::build()`]. Moves `Stopped → Running →
/// Stopped`; [`stop()`](Self::stop) is idempotent and safe after a failed
/// [`start()`](Self::start).
///
/// The pipeline owns the CPAL stream, which is not `Send` on every platform,
/// so keep it on the task that created it rather than spawning it.
///
/// # Example
///
/// ```no_run
/// use beat_osc::{BeatOsc, CaptureConfig, Destination};
///
/// # async fn example() -> Result<(), beat_osc::BeatOscError> {
/// let mut pipeline = BeatOsc::builder()
///     .capture_config(CaptureConfig::new(256)?)
///     .add_destination(Destination::parse("127.0.0.1", "9000", "/beat")?)
///     .build()?;
///
/// pipeline.start().await?;
/// tokio::time::sleep(std::time::Duration::from_secs(10)).await;
/// pipeline.stop().await?;
/// # Ok(())
/// # }
/// ```
///
/// [`CapturePipelineBuilder::build()`]: crate::CapturePipelineBuilder::build
pub struct CapturePipeline {
    config: CaptureConfig,
    pipeline_config: PipelineConfig,
    registry: DestinationRegistry,
    factory: EstimatorFactory,
    event_callback: Option<EventCallback>,
    state: Arc<PipelineState>,
    send_failures: Arc<AtomicU64>,
    fault_rx: Option<oneshot::Receiver<EstimatorFault>>,
    phase: Phase,
}

impl CapturePipeline {
    pub(crate) fn new(
        config: CaptureConfig,
        pipeline_config: PipelineConfig,
        registry: DestinationRegistry,
        factory: EstimatorFactory,
        event_callback: Option<EventCallback>,
    ) -> Self {
        let send_failures = registry.send_failures();
        Self {
            config,
            pipeline_config,
            registry,
            factory,
            event_callback,
            state: Arc::new(PipelineState::new()),
            send_failures,
            fault_rx: None,
            phase: Phase::Stopped,
        }
    }

    /// The capture configuration this pipeline was built with.
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Returns `true` while capture is running.
    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running(_))
    }

    /// Returns current pipeline statistics.
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            buffers_analyzed: self.state.buffers_analyzed.load(Ordering::SeqCst),
            beats_detected: self.state.beats_detected.load(Ordering::SeqCst),
            samples_captured: self.state.samples_captured.load(Ordering::SeqCst),
            overflowed_samples: self.state.overflowed_samples.load(Ordering::SeqCst),
            send_failures: self.send_failures.load(Ordering::SeqCst),
        }
    }

    /// Opens the input device and starts capture.
    ///
    /// Destinations are started first, so an unresolvable host fails before
    /// the device is touched. Calling `start` while running does nothing.
    ///
    /// # Errors
    ///
    /// - `Configuration(UnresolvableHost)` / `DestinationStartFailed` if a destination cannot start
    /// - `DeviceUnavailable` if the input device cannot be opened or streamed from
    pub async fn start(&mut self) -> Result<(), BeatOscError> {
        if self.is_running() {
            return Ok(());
        }
        self.start_destinations().await?;

        let overflow = Arc::clone(&self.state.overflowed_samples);
        let opened = AudioDevice::open(self.config.device()).and_then(|device| {
            device
                .start_capture(
                    self.config.buffer_size(),
                    self.pipeline_config.ring_buffer_duration,
                    overflow,
                    self.event_callback.clone(),
                )
                .map(|capture| (device.name().to_string(), capture))
        });

        let (device_name, (stream, consumer, format)) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                tracing::error!(device = %self.config.device(), "Failed to open input: {}", e);
                self.registry.stop_sinks().await;
                return Err(e);
            }
        };

        self.emit_event(PipelineEvent::CaptureStarted {
            device: device_name.clone(),
            sample_rate: format.sample_rate,
            channels: format.channels,
        });
        tracing::info!(
            device = %device_name,
            sample_rate = format.sample_rate,
            channels = format.channels,
            buffer_size = self.config.buffer_size(),
            destinations = self.registry.len(),
            "capture started"
        );

        self.launch(Some(stream), consumer, format.sample_rate, format.channels);
        Ok(())
    }

    /// Starts the pipeline fed by a [`MockSource`] instead of a device.
    ///
    /// The mock's samples are analyzed exactly as device audio would be,
    /// including format conversion. Useful for testing without hardware.
    ///
    /// # Errors
    ///
    /// Same destination errors as [`start()`](Self::start).
    pub async fn start_with_mock(&mut self, mock: MockSource) -> Result<(), BeatOscError> {
        if self.is_running() {
            return Ok(());
        }
        self.start_destinations().await?;

        let (sample_rate, channels) = (mock.sample_rate(), mock.channels());
        self.emit_event(PipelineEvent::CaptureStarted {
            device: "mock".to_string(),
            sample_rate,
            channels,
        });
        tracing::info!(sample_rate, channels, "mock capture started");

        self.launch(None, mock.into_ring_buffer(), sample_rate, channels);
        Ok(())
    }

    async fn start_destinations(&self) -> Result<(), BeatOscError> {
        if let Err(e) = self.registry.start_sinks().await {
            tracing::error!("Failed to start destinations: {}", e);
            self.registry.stop_sinks().await;
            return Err(e);
        }
        Ok(())
    }

    fn launch(
        &mut self,
        stream: Option<CaptureStream>,
        consumer: ringbuf::HeapCons<f32>,
        device_sample_rate: u32,
        device_channels: u16,
    ) {
        self.state.running.store(true, Ordering::SeqCst);

        let converter = FormatConverter::new(device_sample_rate, device_channels, SAMPLE_RATE);
        let reader = FrameReader::new(consumer, converter, self.config.buffer_size());
        let adapter = EstimatorAdapter::new(&self.factory, self.config.estimator_params());

        let (beat_tx, beat_rx) = mpsc::channel(self.pipeline_config.beat_channel_capacity.max(1));
        let (registry_cmd_tx, registry_cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (fault_tx, fault_rx) = oneshot::channel();

        let registry = self.registry.clone();
        let registry_handle = tokio::spawn(async move {
            registry.run(beat_rx, registry_cmd_rx).await;
        });

        let bridge = BeatBridge::new(
            reader,
            adapter,
            &BridgeConfig {
                buffer_duration: self.config.buffer_duration(),
                silence_threshold: self.pipeline_config.silence_threshold,
                verbose: self.config.verbose(),
            },
            beat_tx,
            fault_tx,
            Arc::clone(&self.state),
            self.event_callback.clone(),
        );
        let bridge_handle = spawn_beat_bridge(bridge);

        self.fault_rx = Some(fault_rx);
        self.phase = Phase::Running(RunningCapture {
            stream,
            bridge_handle,
            registry_handle,
            registry_cmd_tx,
        });
    }

    /// Resolves when the estimator faults or analysis ends on its own.
    ///
    /// An analysis task that exits while the pipeline is running (a panic in
    /// the estimator or a sink, or a dead registry) counts as a fault.
    /// Never resolves if the pipeline is not running, so it can sit in a
    /// `select!` next to a shutdown signal.
    pub async fn fault(&mut self) -> EstimatorFault {
        if let Some(rx) = self.fault_rx.as_mut() {
            let fault = match rx.await {
                Ok(fault) => fault,
                Err(_) => {
                    tracing::error!("analysis task ended unexpectedly");
                    EstimatorFault::Internal(ANALYSIS_ENDED.to_string())
                }
            };
            self.fault_rx = None;
            return fault;
        }
        std::future::pending().await
    }

    /// Stops capture and releases the device.
    ///
    /// This will:
    /// 1. Close the CPAL stream
    /// 2. Let the beat bridge finish its current pass
    /// 3. Deliver queued beats and call `on_stop()` on all sinks
    ///
    /// Does nothing if the pipeline is not running.
    ///
    /// # Errors
    ///
    /// Returns an error if shutdown fails.
    pub async fn stop(&mut self) -> Result<(), BeatOscError> {
        let Phase::Running(running) = std::mem::replace(&mut self.phase, Phase::Stopped) else {
            return Ok(());
        };

        if let Some(stream) = running.stream {
            stream.pause();
            drop(stream);
        }

        self.state.running.store(false, Ordering::SeqCst);
        if let Err(e) = running.bridge_handle.await {
            tracing::error!("Beat bridge task failed: {}", e);
        }

        let _ = running.registry_cmd_tx.send(RegistryCommand::Stop).await;
        if let Err(e) = running.registry_handle.await {
            tracing::error!("Destination registry task failed: {}", e);
        }

        self.fault_rx = None;
        self.emit_event(PipelineEvent::CaptureStopped);

        let stats = self.stats();
        tracing::info!(
            buffers = stats.buffers_analyzed,
            beats = stats.beats_detected,
            send_failures = stats.send_failures,
            overflowed = stats.overflowed_samples,
            "capture stopped"
        );
        Ok(())
    }

    fn emit_event(&self, event: PipelineEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        if let Phase::Running(ref running) = self.phase {
            // Dropped without explicit stop() - trigger background cleanup
            self.state.running.store(false, Ordering::SeqCst);
            let _ = running.registry_cmd_tx.try_send(RegistryCommand::Stop);
        }
    }
}
