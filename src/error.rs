//! Error types for beat-osc.
//!
//! Errors are split into three categories:
//! - **Fatal errors** ([`BeatOscError`]): Prevent the pipeline from starting or end the run
//! - **Estimator faults** ([`EstimatorFault`]): The tempo estimator can no longer be trusted
//! - **Recoverable send errors** ([`SendError`]): One destination missed one beat

use crate::config::DeviceSelection;

/// Fatal errors returned from pipeline construction, startup, or a faulted run.
#[derive(Debug, thiserror::Error)]
pub enum BeatOscError {
    /// Invalid user input, detected before any device is opened.
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    /// The requested (or default) input device could not be opened.
    #[error("{device} unavailable: {reason}")]
    DeviceUnavailable {
        /// Which device was requested.
        device: DeviceSelection,
        /// Why the device could not be used.
        reason: String,
    },

    /// A destination failed during initialization.
    #[error("destination '{destination}' failed to start: {reason}")]
    DestinationStartFailed {
        /// Name of the destination that failed.
        destination: String,
        /// Why the destination failed to start.
        reason: String,
    },

    /// The tempo estimator faulted; its state can no longer be trusted.
    #[error("tempo estimator fault: {0}")]
    Estimator(#[from] EstimatorFault),

    /// An error from the underlying audio library (CPAL).
    #[error("audio backend error: {0}")]
    BackendError(String),
}

impl BeatOscError {
    pub(crate) fn device_unavailable(device: DeviceSelection, reason: impl ToString) -> Self {
        Self::DeviceUnavailable {
            device,
            reason: reason.to_string(),
        }
    }
}

/// Invalid command-line or builder input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Buffer size must be a positive integer.
    #[error("buffer size must be a positive integer, got {value}")]
    NonPositiveBufferSize {
        /// The rejected value.
        value: i64,
    },

    /// Buffer size is larger than the pipeline accepts.
    #[error("buffer size must be at most {max}, got {value}")]
    BufferSizeTooLarge {
        /// The rejected value.
        value: u64,
        /// Largest accepted buffer size.
        max: usize,
    },

    /// A `--client` occurrence did not carry exactly `IP PORT ADDRESS`.
    #[error("client must be given as IP PORT ADDRESS, got {values:?}")]
    MalformedClient {
        /// The values that were supplied.
        values: Vec<String>,
    },

    /// The destination host is empty.
    #[error("client host must not be empty")]
    EmptyHost,

    /// The destination port is not an integer in 1-65535.
    #[error("invalid client port '{value}' (expected 1-65535)")]
    InvalidPort {
        /// The rejected port text.
        value: String,
    },

    /// OSC address patterns must start with `/`.
    #[error("invalid OSC address '{value}' (must start with '/')")]
    InvalidChannel {
        /// The rejected channel label.
        value: String,
    },

    /// At least one destination is required.
    #[error("no destinations configured - add at least one client")]
    NoDestinations,

    /// The destination host name could not be resolved.
    #[error("could not resolve host '{host}': {reason}")]
    UnresolvableHost {
        /// Host that failed to resolve.
        host: String,
        /// Resolver error.
        reason: String,
    },
}

/// Faults signalled by a tempo estimator.
///
/// A fault is fatal to the run: the estimator accumulates context across
/// buffers, and after a fault that context is no longer valid.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EstimatorFault {
    /// The buffer length did not match the configured hop size.
    #[error("expected a buffer of {expected} samples, got {actual}")]
    BufferSize {
        /// Configured hop size.
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },

    /// The buffer contained NaN or infinity.
    #[error("non-finite sample at index {index}")]
    NonFiniteSample {
        /// Position of the first bad sample.
        index: usize,
    },

    /// Any other estimator-internal failure.
    #[error("{0}")]
    Internal(String),
}

/// Errors that can occur within a [`BeatSink`](crate::BeatSink) implementation.
///
/// Send errors are recoverable - the registry logs them, emits a
/// [`PipelineEvent::SendFailed`] and moves on. They are never retried.
///
/// [`PipelineEvent::SendFailed`]: crate::PipelineEvent::SendFailed
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Socket-level failure.
    #[error("send to {destination} failed: {source}")]
    Io {
        /// Destination that failed.
        destination: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The OSC packet could not be encoded.
    #[error("encode failed: {reason}")]
    Encode {
        /// Encoder error.
        reason: String,
    },

    /// The destination host could not be resolved.
    #[error("could not resolve {host}: {reason}")]
    Unresolved {
        /// Host that failed to resolve.
        host: String,
        /// Resolver error.
        reason: String,
    },

    /// The sink was used before initialization.
    #[error("sink not started (call on_start first)")]
    NotStarted,

    /// The receiving channel is full.
    #[error("channel full")]
    ChannelFull,

    /// The receiving channel was closed.
    #[error("channel closed")]
    ChannelClosed,

    /// Custom error for user-implemented sinks.
    #[error("{0}")]
    Custom(String),
}

impl SendError {
    /// Creates a custom send error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Creates an I/O error for the given destination.
    pub fn io(destination: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            destination: destination.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_unavailable_display_with_index() {
        let err = BeatOscError::device_unavailable(DeviceSelection::Index(7), "device busy");
        assert_eq!(err.to_string(), "input device #7 unavailable: device busy");
    }

    #[test]
    fn test_device_unavailable_display_default() {
        let err = BeatOscError::device_unavailable(DeviceSelection::SystemDefault, "none");
        assert_eq!(err.to_string(), "default input device unavailable: none");
    }

    #[test]
    fn test_config_error_wraps() {
        let err: BeatOscError = ConfigError::NonPositiveBufferSize { value: 0 }.into();
        assert_eq!(
            err.to_string(),
            "invalid configuration: buffer size must be a positive integer, got 0"
        );
    }

    #[test]
    fn test_estimator_fault_display() {
        let fault = EstimatorFault::BufferSize {
            expected: 128,
            actual: 64,
        };
        assert_eq!(fault.to_string(), "expected a buffer of 128 samples, got 64");
    }

    #[test]
    fn test_send_error_custom() {
        let err = SendError::custom("something went wrong");
        assert_eq!(err.to_string(), "something went wrong");
    }

    #[test]
    fn test_send_error_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::WouldBlock, "would block");
        let err = SendError::io("127.0.0.1:9000", io_err);
        assert!(err.to_string().contains("127.0.0.1:9000"));
    }
}
