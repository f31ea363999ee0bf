//! CPAL device wrapper for audio capture.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig,
    SupportedBufferSize, SupportedStreamConfig,
};
use ringbuf::traits::{Observer, Producer, Split};
use ringbuf::HeapRb;

use super::max_input_channels;
use crate::config::{DeviceSelection, SAMPLE_RATE};
use crate::event::EventCallback;
use crate::format::{i16_to_f32, u16_to_f32};
use crate::{BeatOscError, PipelineEvent};

/// Sample formats we can capture, most preferred first.
const PREFERRED_FORMATS: [SampleFormat; 3] = [SampleFormat::F32, SampleFormat::I16, SampleFormat::U16];

/// The format a running stream actually delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    /// Device-native sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
}

/// Wrapper around a CPAL audio input device.
///
/// Opening validates the selection eagerly: a bad index or an output-only
/// device fails here, before any stream is built.
#[must_use]
pub struct AudioDevice {
    device: Device,
    selection: DeviceSelection,
    name: String,
}

impl AudioDevice {
    /// Opens the device described by `selection`.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the device does not exist or has no
    /// input channels, `BackendError` if the host cannot be queried.
    pub fn open(selection: DeviceSelection) -> Result<Self, BeatOscError> {
        match selection {
            DeviceSelection::SystemDefault => Self::open_default(),
            DeviceSelection::Index(index) => Self::open_by_index(index),
        }
    }

    /// Opens the default input device.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if no default input device is configured.
    pub fn open_default() -> Result<Self, BeatOscError> {
        let selection = DeviceSelection::SystemDefault;
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| BeatOscError::device_unavailable(selection, "no default input device"))?;

        Ok(Self::from_device(device, selection))
    }

    /// Opens the device at a host index, as printed by `list`.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if there is no device at `index` or it
    /// cannot capture audio.
    pub fn open_by_index(index: usize) -> Result<Self, BeatOscError> {
        let selection = DeviceSelection::Index(index);
        let mut devices = cpal::default_host()
            .devices()
            .map_err(|e| BeatOscError::BackendError(e.to_string()))?;

        let device = devices
            .nth(index)
            .ok_or_else(|| BeatOscError::device_unavailable(selection, "no device at this index"))?;

        if max_input_channels(&device) == 0 {
            return Err(BeatOscError::device_unavailable(
                selection,
                "device has no input channels",
            ));
        }

        Ok(Self::from_device(device, selection))
    }

    fn from_device(device: Device, selection: DeviceSelection) -> Self {
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());
        Self {
            device,
            selection,
            name,
        }
    }

    /// Returns the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Picks a stream configuration, preferring 44.1kHz and float samples.
    fn choose_config(&self) -> Result<SupportedStreamConfig, BeatOscError> {
        let target = SampleRate(SAMPLE_RATE);
        let rank = |format: SampleFormat| PREFERRED_FORMATS.iter().position(|&f| f == format);

        if let Ok(configs) = self.device.supported_input_configs() {
            let best = configs
                .filter(|c| c.min_sample_rate() <= target && target <= c.max_sample_rate())
                .filter_map(|c| rank(c.sample_format()).map(|r| (r, c)))
                .min_by_key(|(r, c)| (*r, c.channels()));
            if let Some((_, range)) = best {
                return Ok(range.with_sample_rate(target));
            }
        }

        let fallback = self
            .device
            .default_input_config()
            .map_err(|e| BeatOscError::device_unavailable(self.selection, e))?;

        if rank(fallback.sample_format()).is_none() {
            return Err(BeatOscError::device_unavailable(
                self.selection,
                format!("unsupported sample format {:?}", fallback.sample_format()),
            ));
        }
        Ok(fallback)
    }

    /// Starts capturing audio and returns a running stream.
    ///
    /// Samples are pushed as interleaved f32 into a ring buffer holding
    /// `ring_duration` of audio; the consumer half is returned. Samples that
    /// do not fit are counted in `overflow`.
    ///
    /// The returned `CaptureStream` must be kept alive for capture to continue.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the stream cannot be built or started.
    pub fn start_capture(
        &self,
        buffer_size: usize,
        ring_duration: Duration,
        overflow: Arc<AtomicU64>,
        event_callback: Option<EventCallback>,
    ) -> Result<(CaptureStream, ringbuf::HeapCons<f32>, CaptureFormat), BeatOscError> {
        let supported = self.choose_config()?;
        let sample_format = supported.sample_format();

        let mut config: StreamConfig = supported.config();
        if let SupportedBufferSize::Range { min, max } = supported.buffer_size() {
            if let Ok(frames) = u32::try_from(buffer_size) {
                if (*min..=*max).contains(&frames) {
                    config.buffer_size = BufferSize::Fixed(frames);
                }
            }
        }

        let format = CaptureFormat {
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        };

        let capacity = (f64::from(format.sample_rate)
            * f64::from(format.channels)
            * ring_duration.as_secs_f64()) as usize;
        let ring_buffer = HeapRb::<f32>::new(capacity.max(buffer_size.saturating_mul(4)).max(1024));
        let (producer, consumer) = ring_buffer.split();

        tracing::info!(
            device = %self.name,
            sample_rate = format.sample_rate,
            channels = format.channels,
            ?sample_format,
            buffer_size = ?config.buffer_size,
            "opening input stream"
        );

        let stream = match sample_format {
            SampleFormat::F32 => self.build_f32_stream(&config, producer, overflow, event_callback)?,
            SampleFormat::I16 => {
                self.build_converting_stream(&config, producer, overflow, event_callback, i16_to_f32)?
            }
            SampleFormat::U16 => {
                self.build_converting_stream(&config, producer, overflow, event_callback, u16_to_f32)?
            }
            other => {
                return Err(BeatOscError::device_unavailable(
                    self.selection,
                    format!("unsupported sample format {other:?}"),
                ));
            }
        };

        stream
            .play()
            .map_err(|e| BeatOscError::device_unavailable(self.selection, e))?;

        Ok((CaptureStream { stream }, consumer, format))
    }

    fn build_f32_stream(
        &self,
        config: &StreamConfig,
        mut producer: ringbuf::HeapProd<f32>,
        overflow: Arc<AtomicU64>,
        event_callback: Option<EventCallback>,
    ) -> Result<Stream, BeatOscError> {
        let channels = usize::from(config.channels.max(1));
        self.device
            .build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let dropped = push_whole_frames(&mut producer, data, channels, |s| s);
                    if dropped > 0 {
                        overflow.fetch_add(dropped as u64, Ordering::Relaxed);
                    }
                },
                stream_error_handler(event_callback),
                None,
            )
            .map_err(|e| BeatOscError::device_unavailable(self.selection, e))
    }

    fn build_converting_stream<T>(
        &self,
        config: &StreamConfig,
        mut producer: ringbuf::HeapProd<f32>,
        overflow: Arc<AtomicU64>,
        event_callback: Option<EventCallback>,
        convert: fn(T) -> f32,
    ) -> Result<Stream, BeatOscError>
    where
        T: SizedSample + 'static,
    {
        let channels = usize::from(config.channels.max(1));
        self.device
            .build_input_stream(
                config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    let dropped = push_whole_frames(&mut producer, data, channels, convert);
                    if dropped > 0 {
                        overflow.fetch_add(dropped as u64, Ordering::Relaxed);
                    }
                },
                stream_error_handler(event_callback),
                None,
            )
            .map_err(|e| BeatOscError::device_unavailable(self.selection, e))
    }
}

/// Pushes as many whole interleaved frames of `data` as fit, so a full ring
/// never splits a frame. Returns the number of samples dropped.
fn push_whole_frames<T: Copy>(
    producer: &mut impl Producer<Item = f32>,
    data: &[T],
    channels: usize,
    convert: impl Fn(T) -> f32,
) -> usize {
    let fits = producer.vacant_len() / channels * channels;
    let take = fits.min(data.len() / channels * channels);
    let pushed = producer.push_iter(data[..take].iter().map(|&s| convert(s)));
    data.len() - pushed
}

fn stream_error_handler(
    event_callback: Option<EventCallback>,
) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| {
        tracing::error!("Audio stream error: {}", err);
        if let Some(ref callback) = event_callback {
            callback(PipelineEvent::StreamInterrupted {
                reason: err.to_string(),
            });
        }
    }
}

/// A running audio capture stream.
///
/// Audio capture continues while this struct is held. When dropped, the CPAL
/// stream is stopped and the device released.
pub struct CaptureStream {
    stream: Stream,
}

impl CaptureStream {
    /// Pauses delivery without releasing the device.
    pub fn pause(&self) {
        if let Err(e) = self.stream.pause() {
            tracing::debug!("Failed to pause stream: {}", e);
        }
    }
}
