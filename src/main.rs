//! FaceRebuild CLI
//!
//! Rebuilds facial-expression video segments from raw captures, with black
//! frames marking the gaps in each segment's frame list.
//!
//! # Usage
//!
//! ```bash
//! facerebuild reconstruct --analysis-root ./analysis --sources ./captures -p 3 -p 4 -j 2
//! facerebuild resolve --analysis-root ./analysis --sources ./captures -p 3 --json
//! facerebuild rewrap -i captures/s1/pp3_navigator.avi -o ./rewrapped
//! facerebuild merge-audio --video out.mp4 --audio capture.avi -o out_audio.mp4
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use facerebuild_cli::adapters::FileConfigAdapter;
use facerebuild_cli::cli::{commands, Cli, Commands};
use facerebuild_cli::utils::logging::{self, LogFormat, LogLevel};

/// Main entry point for the FaceRebuild CLI application
fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = LogLevel::parse(&cli.log_level)?;
    let format = LogFormat::parse(&cli.log_format)?;
    logging::init(level, format)?;
    logging::log_system_info();

    let config = FileConfigAdapter::load(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let result = match cli.command {
        Commands::Reconstruct(args) => {
            info!("Executing reconstruct command");
            commands::reconstruct(args, &config)
        }
        Commands::Resolve(args) => {
            info!("Executing resolve command");
            commands::resolve(args, &config)
        }
        Commands::Rewrap(args) => {
            info!("Executing rewrap command");
            commands::rewrap(args, &config)
        }
        Commands::MergeAudio(args) => {
            info!("Executing merge-audio command");
            commands::merge_audio(args, &config)
        }
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
