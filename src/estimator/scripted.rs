//! Scripted estimator for testing without real audio analysis.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::TempoEstimator;
use crate::EstimatorFault;

/// One scripted response of a [`ScriptedEstimator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptStep {
    /// No beat in this buffer.
    Quiet,
    /// A beat in this buffer, with the tempo to report from now on.
    Beat(f32),
    /// Signal an estimator fault.
    Fault,
}

/// An estimator that replays a fixed script, one step per buffer.
///
/// After the script runs out every further buffer is [`ScriptStep::Quiet`].
/// This makes the pipeline's fan-out and ordering behavior testable without
/// depending on real beat detection.
///
/// # Example
///
/// ```
/// use beat_osc::estimator::{ScriptedEstimator, TempoEstimator};
///
/// // Beat on the 5th buffer (index 4) at 120 BPM
/// let mut estimator = ScriptedEstimator::beats_at([(4, 120.0)]);
/// let buffer = [0.0f32; 128];
/// let flags: Vec<bool> = (0..6).map(|_| estimator.analyze(&buffer).unwrap()).collect();
/// assert_eq!(flags, [false, false, false, false, true, false]);
/// assert_eq!(estimator.current_tempo(), 120.0);
/// ```
pub struct ScriptedEstimator {
    steps: VecDeque<ScriptStep>,
    tempo: f32,
    calls: Arc<AtomicU64>,
}

impl ScriptedEstimator {
    /// Creates an estimator that replays `steps`.
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            tempo: 0.0,
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Creates an estimator that never reports a beat.
    pub fn silent() -> Self {
        Self::new([])
    }

    /// Creates an estimator with beats at the given buffer indices.
    pub fn beats_at(beats: impl IntoIterator<Item = (usize, f32)>) -> Self {
        let mut steps = Vec::new();
        for (index, tempo) in beats {
            if steps.len() <= index {
                steps.resize(index + 1, ScriptStep::Quiet);
            }
            steps[index] = ScriptStep::Beat(tempo);
        }
        Self::new(steps)
    }

    /// Shared counter of `analyze` calls, readable after the estimator is moved.
    pub fn call_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.calls)
    }
}

impl TempoEstimator for ScriptedEstimator {
    fn analyze(&mut self, _buffer: &[f32]) -> Result<bool, EstimatorFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.steps.pop_front().unwrap_or(ScriptStep::Quiet) {
            ScriptStep::Quiet => Ok(false),
            ScriptStep::Beat(tempo) => {
                self.tempo = tempo;
                Ok(true)
            }
            ScriptStep::Fault => Err(EstimatorFault::Internal("scripted fault".to_string())),
        }
    }

    fn current_tempo(&self) -> f32 {
        self.tempo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beats_at_builds_sparse_script() {
        let mut estimator = ScriptedEstimator::beats_at([(1, 90.0), (3, 95.0)]);
        let buffer = [0.0f32; 4];

        let flags: Vec<bool> = (0..5).map(|_| estimator.analyze(&buffer).unwrap()).collect();
        assert_eq!(flags, vec![false, true, false, true, false]);
        assert_eq!(estimator.current_tempo(), 95.0);
    }

    #[test]
    fn test_call_counter() {
        let mut estimator = ScriptedEstimator::silent();
        let counter = estimator.call_counter();

        for _ in 0..3 {
            estimator.analyze(&[0.0]).unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_fault_step() {
        let mut estimator = ScriptedEstimator::new([ScriptStep::Fault]);
        assert!(estimator.analyze(&[0.0]).is_err());
    }
}
