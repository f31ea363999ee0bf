//! Capture pipeline components.
//!
//! The pipeline connects the audio device to the destinations:
//!
//! ```text
//! CPAL Thread → Ring Buffer → Beat Bridge → Destination Registry → Sinks
//! ```
//!
//! - **Ring Buffer**: Lock-free SPSC queue; the audio callback never blocks
//! - **Beat Bridge**: Cuts fixed-size frames, runs the estimator, forwards beats
//! - **Destination Registry**: Fans each beat out to every sink, no retries
//!
//! Only the audio callback runs on the CPAL thread. Analysis and sends run
//! on the tokio runtime.

mod bridge;
mod frames;
mod router;

pub(crate) use bridge::{spawn_beat_bridge, BeatBridge, BridgeConfig};
pub(crate) use frames::FrameReader;
pub(crate) use router::{DestinationRegistry, RegistryCommand};
