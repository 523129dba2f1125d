//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;
use clap_num::number_range;

fn participant_id(s: &str) -> Result<u32, String> {
    number_range(s, 1, u32::MAX)
}

fn job_count(s: &str) -> Result<usize, String> {
    number_range(s, 0, 1024)
}

/// Arguments for the reconstruct command
#[derive(Args, Debug)]
pub struct ReconstructArgs {
    /// Analysis root holding Video/ segment CSVs and sidecar frame lists
    #[arg(long, env = "FACEREBUILD_ANALYSIS_ROOT")]
    pub analysis_root: PathBuf,

    /// Directory searched recursively for capture files
    #[arg(long, env = "FACEREBUILD_SOURCES")]
    pub sources: PathBuf,

    /// Participant ids to process
    #[arg(short = 'p', long = "participant", required = true, num_args = 1.., value_parser = participant_id)]
    pub participants: Vec<u32>,

    /// Participants processed in parallel (0 = one per CPU)
    #[arg(short, long, default_value = "1", env = "FACEREBUILD_JOBS", value_parser = job_count)]
    pub jobs: usize,

    /// How seek positions are derived (declared, sequential)
    #[arg(long, env = "FACEREBUILD_SEEK_MODE")]
    pub seek_mode: Option<String>,

    /// What replaces an unreadable frame in the full stream (omit, fill)
    #[arg(long, env = "FACEREBUILD_ON_READ_FAILURE")]
    pub on_read_failure: Option<String>,

    /// Video encoder for the outputs (libavcodec name)
    #[arg(long, env = "FACEREBUILD_CODEC")]
    pub codec: Option<String>,

    /// Write the per-participant reports as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Arguments for the resolve command
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Analysis root holding Video/ segment CSVs and sidecar frame lists
    #[arg(long, env = "FACEREBUILD_ANALYSIS_ROOT")]
    pub analysis_root: PathBuf,

    /// Directory searched recursively for capture files
    #[arg(long, env = "FACEREBUILD_SOURCES")]
    pub sources: PathBuf,

    /// Participant id
    #[arg(short = 'p', long = "participant", value_parser = participant_id)]
    pub participant: u32,

    /// How seek positions are derived (declared, sequential)
    #[arg(long, env = "FACEREBUILD_SEEK_MODE")]
    pub seek_mode: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the rewrap command
#[derive(Args, Debug)]
pub struct RewrapArgs {
    /// Capture file to rewrap
    #[arg(short, long)]
    pub input: PathBuf,

    /// Root under which `<parent dir>/<stem>_rewrapped.<ext>` is written
    #[arg(short, long)]
    pub output_root: PathBuf,

    /// Rewrap strategy (remux, reencode)
    #[arg(long, env = "FACEREBUILD_REWRAP_MODE")]
    pub mode: Option<String>,
}

/// Arguments for the merge-audio command
#[derive(Args, Debug)]
pub struct MergeAudioArgs {
    /// Video whose picture is kept
    #[arg(long)]
    pub video: PathBuf,

    /// File whose first audio stream is attached
    #[arg(long)]
    pub audio: PathBuf,

    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Audio handling (copy, aac)
    #[arg(long, env = "FACEREBUILD_AUDIO_CODEC")]
    pub audio_codec: Option<String>,
}
