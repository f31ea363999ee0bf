//! Tempo/beat estimator contract and the adapter the pipeline drives it through.
//!
//! The pipeline never looks inside an estimator. It builds one through an
//! [`EstimatorFactory`] with [`EstimatorParams`] derived from the buffer size,
//! then feeds it every analysis buffer, in order, via [`EstimatorAdapter`].
//!
//! Two implementations ship with the crate:
//!
//! - [`SpectralFluxEstimator`]: the default, a real-time onset/tempo tracker
//! - [`ScriptedEstimator`]: replays scripted beat flags for tests

mod scripted;
mod spectral_flux;

pub use scripted::{ScriptStep, ScriptedEstimator};
pub use spectral_flux::SpectralFluxEstimator;

use std::sync::Arc;

use crate::{BeatEvent, EstimatorFault};

/// Construction parameters for a tempo estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimatorParams {
    /// Analysis window in samples (always twice the hop size).
    pub window_size: usize,
    /// Samples consumed per call (the capture buffer size).
    pub hop_size: usize,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl EstimatorParams {
    /// Parameters for a given capture buffer size: window `2 × buffer_size`,
    /// hop `buffer_size`.
    #[must_use]
    pub fn for_buffer_size(buffer_size: usize, sample_rate: u32) -> Self {
        Self {
            window_size: buffer_size.saturating_mul(2),
            hop_size: buffer_size,
            sample_rate,
        }
    }
}

/// A stateful beat/tempo estimator.
///
/// # Contract
///
/// - `analyze` is called with buffers of exactly `hop_size` samples, in
///   arrival order, with no gaps. The estimator accumulates context across
///   calls.
/// - `analyze` must return within a small fraction of the buffer's real-time
///   duration. It must not block, do I/O, or allocate per call.
/// - An `Err` means internal state is no longer trustworthy; the pipeline
///   stops analysis.
pub trait TempoEstimator: Send {
    /// Consumes one buffer and reports whether a beat occurred in it.
    fn analyze(&mut self, buffer: &[f32]) -> Result<bool, EstimatorFault>;

    /// Current tempo estimate in BPM, `0.0` while unknown.
    fn current_tempo(&self) -> f32;
}

/// Builds a fresh estimator for each pipeline start.
pub type EstimatorFactory = Arc<dyn Fn(EstimatorParams) -> Box<dyn TempoEstimator> + Send + Sync>;

/// Creates an [`EstimatorFactory`] from a closure.
///
/// # Example
///
/// ```
/// use beat_osc::estimator::{estimator_factory, ScriptedEstimator};
///
/// let factory = estimator_factory(|_params| Box::new(ScriptedEstimator::beats_at([(4, 120.0)])));
/// ```
pub fn estimator_factory<F>(f: F) -> EstimatorFactory
where
    F: Fn(EstimatorParams) -> Box<dyn TempoEstimator> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The factory used when none is configured.
pub fn default_estimator_factory() -> EstimatorFactory {
    estimator_factory(|params| Box::new(SpectralFluxEstimator::new(params)))
}

/// Feeds fixed-size buffers to an estimator and turns beat flags into [`BeatEvent`]s.
pub struct EstimatorAdapter {
    estimator: Box<dyn TempoEstimator>,
    params: EstimatorParams,
    buffers_analyzed: u64,
}

impl EstimatorAdapter {
    /// Builds the estimator through `factory`.
    pub fn new(factory: &EstimatorFactory, params: EstimatorParams) -> Self {
        Self {
            estimator: factory(params),
            params,
            buffers_analyzed: 0,
        }
    }

    /// Parameters the estimator was built with.
    pub fn params(&self) -> EstimatorParams {
        self.params
    }

    /// Number of buffers analyzed so far.
    pub fn buffers_analyzed(&self) -> u64 {
        self.buffers_analyzed
    }

    /// Analyzes one buffer.
    ///
    /// Returns `Some(BeatEvent)` exactly when the estimator flags a beat.
    ///
    /// # Errors
    ///
    /// `BufferSize` if the buffer length differs from the hop size, or any
    /// fault the estimator reports.
    pub fn process(&mut self, buffer: &[f32]) -> Result<Option<BeatEvent>, EstimatorFault> {
        if buffer.len() != self.params.hop_size {
            return Err(EstimatorFault::BufferSize {
                expected: self.params.hop_size,
                actual: buffer.len(),
            });
        }

        let index = self.buffers_analyzed;
        let beat = self.estimator.analyze(buffer)?;
        self.buffers_analyzed += 1;

        Ok(beat.then(|| BeatEvent::new(self.estimator.current_tempo(), index)))
    }
}
