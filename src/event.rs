//! Runtime events for monitoring pipeline health.
//!
//! Events are non-fatal notifications about pipeline behavior. Capture
//! continues after events are emitted - they're for logging/metrics,
//! not error handling. The one exception is [`PipelineEvent::EstimatorFaulted`],
//! which is emitted right before analysis stops.

use std::sync::Arc;

/// Runtime events emitted during capture.
///
/// Use the [`EventCallback`] to log these or update metrics.
///
/// # Example
///
/// ```
/// use beat_osc::PipelineEvent;
///
/// fn handle_event(event: PipelineEvent) {
///     match event {
///         PipelineEvent::CaptureStarted { device, sample_rate, channels } => {
///             eprintln!("Capturing from {} ({}Hz/{}ch)", device, sample_rate, channels);
///         }
///         PipelineEvent::BufferOverflow { dropped_samples } => {
///             eprintln!("Warning: dropped {} samples", dropped_samples);
///         }
///         PipelineEvent::SendFailed { destination, error } => {
///             eprintln!("Destination '{}' missed a beat: {}", destination, error);
///         }
///         PipelineEvent::StreamInterrupted { reason } => {
///             eprintln!("Stream interrupted: {}", reason);
///         }
///         PipelineEvent::AudioFlowStopped { silent_duration_ms } => {
///             eprintln!("Input silent for {}ms", silent_duration_ms);
///         }
///         PipelineEvent::AudioFlowResumed => eprintln!("Input resumed"),
///         PipelineEvent::EstimatorFaulted { reason } => {
///             eprintln!("Estimator fault: {}", reason);
///         }
///         PipelineEvent::CaptureStopped => eprintln!("Capture stopped"),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// The input stream is open and delivering audio.
    CaptureStarted {
        /// Name of the capture device.
        device: String,
        /// Device-native sample rate.
        sample_rate: u32,
        /// Device-native channel count.
        channels: u16,
    },

    /// The ring buffer dropped samples because analysis fell behind.
    ///
    /// The estimator relies on gapless input, so this degrades accuracy.
    /// Consider increasing `ring_buffer_duration` or the buffer size.
    BufferOverflow {
        /// Samples dropped since the previous report.
        dropped_samples: u64,
    },

    /// A destination failed to receive a beat.
    ///
    /// The beat is not retried; other destinations are unaffected.
    SendFailed {
        /// Name of the destination.
        destination: String,
        /// Description of the error.
        error: String,
    },

    /// The audio driver reported a stream error.
    StreamInterrupted {
        /// Description of why the stream was interrupted.
        reason: String,
    },

    /// The input delivered only silence for longer than the configured threshold.
    AudioFlowStopped {
        /// Duration of silence before this event was emitted.
        silent_duration_ms: u64,
    },

    /// Audio resumed after an [`AudioFlowStopped`] event.
    ///
    /// [`AudioFlowStopped`]: PipelineEvent::AudioFlowStopped
    AudioFlowResumed,

    /// The estimator faulted and analysis has stopped.
    EstimatorFaulted {
        /// Description of the fault.
        reason: String,
    },

    /// The pipeline has been torn down.
    CaptureStopped,
}

/// Callback type for receiving runtime events.
///
/// Register an event callback via [`CapturePipelineBuilder::on_event()`].
///
/// [`CapturePipelineBuilder::on_event()`]: crate::CapturePipelineBuilder::on_event
pub type EventCallback = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use beat_osc::{event_callback, PipelineEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(PipelineEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_event_debug() {
        let event = PipelineEvent::BufferOverflow {
            dropped_samples: 100,
        };
        let debug = format!("{event:?}");
        assert!(debug.contains("BufferOverflow"));
        assert!(debug.contains("100"));
    }

    #[test]
    fn test_pipeline_event_clone() {
        let event = PipelineEvent::SendFailed {
            destination: "osc:/beat@127.0.0.1:9000".to_string(),
            error: "unreachable".to_string(),
        };
        if let PipelineEvent::SendFailed { destination, error } = event.clone() {
            assert_eq!(destination, "osc:/beat@127.0.0.1:9000");
            assert_eq!(error, "unreachable");
        } else {
            panic!("Expected SendFailed variant");
        }
    }

    #[test]
    fn test_event_callback_helper() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let callback = event_callback(move |_| {
            called_clone.store(true, Ordering::SeqCst);
        });

        callback(PipelineEvent::CaptureStopped);
        assert!(called.load(Ordering::SeqCst));
    }
}
