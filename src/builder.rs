//! Builder pattern for `CapturePipeline`.

use std::sync::Arc;

use crate::estimator::{default_estimator_factory, EstimatorFactory};
use crate::pipeline::DestinationRegistry;
use crate::sink::{BeatSink, OscSink};
use crate::{
    event_callback, BeatOscError, CaptureConfig, CapturePipeline, ConfigError, Destination,
    EventCallback, PipelineConfig, PipelineEvent,
};

/// Builder for configuring a [`CapturePipeline`].
///
/// Use [`BeatOsc::builder()`] to create a new builder. Everything is
/// validated in [`build()`](Self::build), before any device or socket is
/// opened.
///
/// # Example
///
/// ```no_run
/// use beat_osc::{BeatOsc, CaptureConfig, DeviceSelection, Destination};
///
/// # async fn example() -> Result<(), beat_osc::BeatOscError> {
/// let mut pipeline = BeatOsc::builder()
///     .capture_config(CaptureConfig::new(512)?.with_device(DeviceSelection::Index(2)))
///     .add_destination(Destination::parse("192.168.1.20", "7000", "/lights/beat")?)
///     .add_destination(Destination::parse("127.0.0.1", "9000", "/beat")?)
///     .on_event(|e| tracing::warn!(?e, "pipeline event"))
///     .build()?;
///
/// pipeline.start().await?;
/// # Ok(())
/// # }
/// ```
///
/// [`BeatOsc::builder()`]: crate::BeatOsc::builder
#[must_use]
pub struct CapturePipelineBuilder {
    capture: CaptureConfig,
    sinks: Vec<Arc<dyn BeatSink>>,
    estimator: Option<EstimatorFactory>,
    event_callback: Option<EventCallback>,
    config: PipelineConfig,
}

impl Default for CapturePipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CapturePipelineBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            capture: CaptureConfig::default(),
            sinks: Vec::new(),
            estimator: None,
            event_callback: None,
            config: PipelineConfig::default(),
        }
    }

    /// Set buffer size, device and verbosity.
    ///
    /// Default: 128-sample buffers from the system default device, quiet.
    pub fn capture_config(mut self, config: CaptureConfig) -> Self {
        self.capture = config;
        self
    }

    /// Send beats as OSC over UDP to `destination`.
    ///
    /// Destinations receive beats in the order they were added. Duplicates
    /// are allowed and each receives its own copy.
    pub fn add_destination(self, destination: Destination) -> Self {
        self.add_sink(OscSink::new(destination))
    }

    /// Add a custom sink that receives every beat.
    pub fn add_sink<S: BeatSink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Replace the built-in spectral flux estimator.
    pub fn estimator(mut self, factory: EstimatorFactory) -> Self {
        self.estimator = Some(factory);
        self
    }

    /// Set a callback to receive runtime events.
    ///
    /// Events include buffer overflow warnings, send failures, and stream interruptions.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(PipelineEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Set custom pipeline tuning.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Number of destinations and sinks configured so far.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Validates the builder configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.sinks.is_empty() {
            return Err(ConfigError::NoDestinations);
        }
        Ok(())
    }

    /// Builds the pipeline without starting it.
    ///
    /// # Errors
    ///
    /// Returns `Configuration(NoDestinations)` if no destination or sink was added.
    pub fn build(self) -> Result<CapturePipeline, BeatOscError> {
        self.validate()?;

        let registry =
            DestinationRegistry::new(self.sinks).with_event_callback(self.event_callback.clone());

        Ok(CapturePipeline::new(
            self.capture,
            self.config,
            registry,
            self.estimator.unwrap_or_else(default_estimator_factory),
            self.event_callback,
        ))
    }

    /// Builds the pipeline and starts capture from the configured device.
    ///
    /// # Errors
    ///
    /// Any error from [`build()`](Self::build) or [`CapturePipeline::start()`].
    pub async fn start(self) -> Result<CapturePipeline, BeatOscError> {
        let mut pipeline = self.build()?;
        pipeline.start().await?;
        Ok(pipeline)
    }
}

/// Main entry point for beat-osc.
///
/// Use [`BeatOsc::builder()`] to start configuring a pipeline.
pub struct BeatOsc;

impl BeatOsc {
    /// Creates a new builder for configuring beat capture.
    pub fn builder() -> CapturePipelineBuilder {
        CapturePipelineBuilder::new()
    }
}
