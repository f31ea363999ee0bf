//! # beat-osc
//!
//! Live audio beat detection broadcast to OSC listeners.
//!
//! `beat-osc` captures an audio input device via CPAL, runs a real-time
//! tempo/beat estimator over fixed-size buffers, and sends every detected
//! beat as an OSC message (`<address> ,f <tempo>`) over UDP to one or more
//! destinations.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use beat_osc::{BeatOsc, CaptureConfig, Destination};
//!
//! # async fn run() -> Result<(), beat_osc::BeatOscError> {
//! let mut pipeline = BeatOsc::builder()
//!     .capture_config(CaptureConfig::new(256)?.with_verbose(true))
//!     .add_destination(Destination::parse("127.0.0.1", "9000", "/beat")?)
//!     .on_event(|e| tracing::warn!(?e, "pipeline event"))
//!     .build()?;
//!
//! pipeline.start().await?;
//! tokio::signal::ctrl_c().await.ok();
//! pipeline.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **CPAL Thread**: Audio callback that converts to `f32` and never blocks
//! - **Ring Buffer**: Lock-free SPSC queue between the callback and analysis
//! - **Beat Bridge**: Tokio task that cuts frames and runs the estimator
//! - **Destination Registry**: Tokio task that fans beats out to every sink
//!
//! A slow or unreachable destination never stalls analysis, and analysis
//! never stalls the audio callback.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod beat;
mod builder;
mod capture;
mod config;
mod destination;
mod error;
pub mod estimator;
mod event;
mod feedback;
pub mod format;
pub mod lifecycle;
mod pipeline;
mod sink;
pub mod source;

pub use beat::BeatEvent;
pub use builder::{BeatOsc, CapturePipelineBuilder};
pub use capture::{CapturePipeline, PipelineStats};
pub use config::{
    CaptureConfig, DeviceSelection, PipelineConfig, DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE, SAMPLE_RATE,
};
pub use destination::Destination;
pub use error::{BeatOscError, ConfigError, EstimatorFault, SendError};
pub use event::{event_callback, EventCallback, PipelineEvent};
pub use feedback::BeatPrinter;
pub use sink::{encode_beat, BeatSink, ChannelSink, OscSink};
pub use source::{list_input_devices, AudioDevice, DeviceDescriptor, MockSource};
