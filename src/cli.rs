//! Command-line interface.

use clap::{ArgAction, Args, Parser, Subcommand};

use beat_osc::{CaptureConfig, ConfigError, DeviceSelection, Destination, DEFAULT_BUFFER_SIZE};

/// Detect beats in live audio and broadcast them as OSC over UDP.
#[derive(Debug, Parser)]
#[command(name = "beat-osc", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List audio input devices.
    List,
    /// Detect beats and send them to OSC clients.
    Beat(BeatArgs),
}

#[derive(Debug, Args)]
pub struct BeatArgs {
    /// OSC client that receives beats. Repeat for multiple clients.
    #[arg(
        short,
        long,
        required = true,
        num_args = 3,
        value_names = ["IP", "PORT", "ADDRESS"],
        action = ArgAction::Append,
    )]
    pub client: Vec<String>,

    /// Samples per analysis buffer.
    #[arg(short, long, default_value_t = DEFAULT_BUFFER_SIZE as i64, allow_negative_numbers = true)]
    pub bufsize: i64,

    /// Input device index as printed by `list`. Defaults to the system input.
    #[arg(short, long)]
    pub device: Option<usize>,

    /// Print a line for every beat.
    #[arg(short, long)]
    pub verbose: bool,
}

impl BeatArgs {
    /// Validates the arguments into a capture configuration and destination list.
    pub fn to_config(&self) -> Result<(CaptureConfig, Vec<Destination>), ConfigError> {
        let config = CaptureConfig::from_signed(self.bufsize)?
            .with_device(DeviceSelection::from(self.device))
            .with_verbose(self.verbose);

        if self.client.len() % 3 != 0 {
            return Err(ConfigError::MalformedClient {
                values: self.client.clone(),
            });
        }
        let destinations = self
            .client
            .chunks(3)
            .map(|c| Destination::parse(&c[0], &c[1], &c[2]))
            .collect::<Result<Vec<_>, _>>()?;

        if destinations.is_empty() {
            return Err(ConfigError::NoDestinations);
        }
        Ok((config, destinations))
    }
}
