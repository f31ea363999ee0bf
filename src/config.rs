//! Configuration types for beat capture.

use std::fmt;
use std::time::Duration;

use crate::estimator::EstimatorParams;
use crate::ConfigError;

/// Sample rate the estimator always runs at, in Hz.
pub const SAMPLE_RATE: u32 = 44_100;

/// Default analysis buffer size in samples.
pub const DEFAULT_BUFFER_SIZE: usize = 128;

/// Largest accepted analysis buffer size in samples (about 1.5 s at 44.1 kHz).
pub const MAX_BUFFER_SIZE: usize = 1 << 16;

/// Specifies which audio input device to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceSelection {
    /// Use the system's default input device.
    #[default]
    SystemDefault,
    /// Use the device at this host-assigned index (as printed by `list`).
    Index(usize),
}

impl DeviceSelection {
    /// Returns the requested index, if any.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::SystemDefault => None,
            Self::Index(index) => Some(*index),
        }
    }
}

impl From<Option<usize>> for DeviceSelection {
    fn from(index: Option<usize>) -> Self {
        index.map_or(Self::SystemDefault, Self::Index)
    }
}

impl fmt::Display for DeviceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SystemDefault => write!(f, "default input device"),
            Self::Index(index) => write!(f, "input device #{index}"),
        }
    }
}

/// What to capture and how to analyze it.
///
/// Immutable once built; the buffer size is validated on construction.
///
/// # Example
///
/// ```
/// use beat_osc::{CaptureConfig, DeviceSelection};
///
/// let config = CaptureConfig::new(256)?
///     .with_device(DeviceSelection::Index(2))
///     .with_verbose(true);
/// assert_eq!(config.estimator_params().window_size, 512);
/// # Ok::<(), beat_osc::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    buffer_size: usize,
    device: DeviceSelection,
    verbose: bool,
}

impl CaptureConfig {
    /// Creates a configuration with the given buffer size.
    ///
    /// # Errors
    ///
    /// Returns `NonPositiveBufferSize` if `buffer_size` is zero, or
    /// `BufferSizeTooLarge` if it exceeds [`MAX_BUFFER_SIZE`].
    pub fn new(buffer_size: usize) -> Result<Self, ConfigError> {
        if buffer_size == 0 {
            return Err(ConfigError::NonPositiveBufferSize { value: 0 });
        }
        if buffer_size > MAX_BUFFER_SIZE {
            return Err(ConfigError::BufferSizeTooLarge {
                value: buffer_size as u64,
                max: MAX_BUFFER_SIZE,
            });
        }
        Ok(Self {
            buffer_size,
            device: DeviceSelection::SystemDefault,
            verbose: false,
        })
    }

    /// Creates a configuration from a signed value as typed on the command line.
    ///
    /// # Errors
    ///
    /// Returns `NonPositiveBufferSize` if `value` is zero or negative, or
    /// `BufferSizeTooLarge` if it exceeds [`MAX_BUFFER_SIZE`].
    pub fn from_signed(value: i64) -> Result<Self, ConfigError> {
        if value <= 0 {
            return Err(ConfigError::NonPositiveBufferSize { value });
        }
        let size = usize::try_from(value).map_err(|_| ConfigError::BufferSizeTooLarge {
            value: value as u64,
            max: MAX_BUFFER_SIZE,
        })?;
        Self::new(size)
    }

    /// Selects the input device.
    #[must_use]
    pub fn with_device(mut self, device: DeviceSelection) -> Self {
        self.device = device;
        self
    }

    /// Enables console feedback on each beat.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Samples per analysis buffer.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Always [`SAMPLE_RATE`].
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// The selected input device.
    #[must_use]
    pub fn device(&self) -> DeviceSelection {
        self.device
    }

    /// Whether console feedback is enabled.
    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Real-time duration of one analysis buffer.
    #[must_use]
    pub fn buffer_duration(&self) -> Duration {
        Duration::from_secs_f64(self.buffer_size as f64 / f64::from(SAMPLE_RATE))
    }

    /// Parameters the tempo estimator is constructed with.
    #[must_use]
    pub fn estimator_params(&self) -> EstimatorParams {
        EstimatorParams::for_buffer_size(self.buffer_size, SAMPLE_RATE)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            device: DeviceSelection::SystemDefault,
            verbose: false,
        }
    }
}

/// Tuning for the capture pipeline internals.
///
/// Use [`PipelineConfig::default()`] for sensible defaults, or customize as needed.
///
/// # Example
///
/// ```
/// use beat_osc::PipelineConfig;
/// use std::time::Duration;
///
/// let config = PipelineConfig {
///     ring_buffer_duration: Duration::from_secs(30),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Capacity of the ring buffer between the audio callback and the analyzer.
    ///
    /// If it fills, samples are dropped and a [`PipelineEvent::BufferOverflow`]
    /// is emitted.
    /// Default: 10 seconds
    ///
    /// [`PipelineEvent::BufferOverflow`]: crate::PipelineEvent::BufferOverflow
    pub ring_buffer_duration: Duration,

    /// Beats that may queue up in front of the destination registry.
    ///
    /// Default: 64
    pub beat_channel_capacity: usize,

    /// How long the input may deliver pure silence before
    /// [`PipelineEvent::AudioFlowStopped`] is emitted.
    ///
    /// Default: 2 seconds
    ///
    /// [`PipelineEvent::AudioFlowStopped`]: crate::PipelineEvent::AudioFlowStopped
    pub silence_threshold: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ring_buffer_duration: Duration::from_secs(10),
            beat_channel_capacity: 64,
            silence_threshold: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_config_rejects_zero() {
        assert_eq!(
            CaptureConfig::new(0),
            Err(ConfigError::NonPositiveBufferSize { value: 0 })
        );
    }

    #[test]
    fn test_capture_config_from_signed() {
        assert_eq!(CaptureConfig::from_signed(256).unwrap().buffer_size(), 256);
        assert_eq!(
            CaptureConfig::from_signed(-4),
            Err(ConfigError::NonPositiveBufferSize { value: -4 })
        );
        assert_eq!(
            CaptureConfig::from_signed(0),
            Err(ConfigError::NonPositiveBufferSize { value: 0 })
        );
    }

    #[test]
    fn test_capture_config_upper_limit() {
        assert_eq!(
            CaptureConfig::new(MAX_BUFFER_SIZE).unwrap().buffer_size(),
            MAX_BUFFER_SIZE
        );
        assert_eq!(
            CaptureConfig::new(MAX_BUFFER_SIZE + 1),
            Err(ConfigError::BufferSizeTooLarge {
                value: MAX_BUFFER_SIZE as u64 + 1,
                max: MAX_BUFFER_SIZE
            })
        );
        assert!(matches!(
            CaptureConfig::from_signed(i64::MAX),
            Err(ConfigError::BufferSizeTooLarge { .. })
        ));
        assert!(matches!(
            CaptureConfig::from_signed(17_179_869_184),
            Err(ConfigError::BufferSizeTooLarge { .. })
        ));
    }

    #[test]
    fn test_capture_config_defaults() {
        let config = CaptureConfig::default();
        assert_eq!(config.buffer_size(), 128);
        assert_eq!(config.sample_rate(), 44_100);
        assert_eq!(config.device(), DeviceSelection::SystemDefault);
        assert!(!config.verbose());
    }

    #[test]
    fn test_estimator_params_follow_buffer_size() {
        for size in [1usize, 64, 128, 256, 1000, 4096] {
            let params = CaptureConfig::new(size).unwrap().estimator_params();
            assert_eq!(params.window_size, 2 * size);
            assert_eq!(params.hop_size, size);
            assert_eq!(params.sample_rate, SAMPLE_RATE);
        }
    }

    #[test]
    fn test_buffer_duration() {
        let config = CaptureConfig::new(441).unwrap();
        assert_eq!(config.buffer_duration(), Duration::from_millis(10));
    }

    #[test]
    fn test_device_selection() {
        assert_eq!(DeviceSelection::from(Some(3)), DeviceSelection::Index(3));
        assert_eq!(DeviceSelection::from(None), DeviceSelection::SystemDefault);
        assert_eq!(DeviceSelection::Index(3).index(), Some(3));
        assert_eq!(DeviceSelection::Index(3).to_string(), "input device #3");
    }

    #[test]
    fn test_pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.ring_buffer_duration, Duration::from_secs(10));
        assert_eq!(config.beat_channel_capacity, 64);
        assert_eq!(config.silence_threshold, Duration::from_secs(2));
    }
}
