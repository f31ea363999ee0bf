//! `beat-osc` binary: list input devices, or detect beats and broadcast them.

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod cli;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use beat_osc::{lifecycle, list_input_devices, BeatOsc, BeatOscError};
use cli::{BeatArgs, Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::List => list(),
        Command::Beat(args) => beat(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn list() -> Result<(), BeatOscError> {
    for device in list_input_devices()? {
        println!("{device}");
    }
    Ok(())
}

async fn beat(args: BeatArgs) -> Result<(), BeatOscError> {
    let (config, destinations) = args.to_config()?;

    let mut builder = BeatOsc::builder().capture_config(config);
    for destination in destinations {
        builder = builder.add_destination(destination);
    }
    let mut pipeline = builder.build()?;
    pipeline.start().await?;

    lifecycle::run_until(&mut pipeline, lifecycle::wait_for_termination()).await
}
