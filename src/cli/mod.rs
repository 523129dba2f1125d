//! CLI module for FaceRebuild
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod args;
pub mod commands;

/// FaceRebuild segment reconstruction
///
/// Rebuilds per-participant facial-expression video segments from raw capture
/// files, filling gaps in the declared frame lists with black frames.
#[derive(Parser, Debug)]
#[command(name = "facerebuild")]
#[command(about = "Reconstruct facial-expression video segments with explicit gap filling")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Logging level (error, warn, info, debug, trace); RUST_LOG overrides it
    #[arg(long, default_value = "info", env = "FACEREBUILD_LOG_LEVEL", global = true)]
    pub log_level: String,

    /// Log output format (pretty, compact, json)
    #[arg(long, default_value = "pretty", env = "FACEREBUILD_LOG_FORMAT", global = true)]
    pub log_format: String,

    /// Configuration file (TOML or YAML); defaults to ./facerebuild.toml if present
    #[arg(long, env = "FACEREBUILD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconstruct every segment of one or more participants
    Reconstruct(args::ReconstructArgs),
    /// Print the resolved sources and frame plans without touching media
    Resolve(args::ResolveArgs),
    /// Rewrite a capture whose container reports no frame count
    Rewrap(args::RewrapArgs),
    /// Attach an audio track to a video
    MergeAudio(args::MergeAudioArgs),
}
