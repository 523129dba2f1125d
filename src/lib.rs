//! FaceRebuild segment reconstruction library
//!
//! Resolves per-participant segment descriptors to capture files and absolute
//! frame plans, then re-encodes each segment into a gap-filled stream and a
//! filler-free stream.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod output;
pub mod ports;
pub mod resolver;
pub mod utils;

// Re-export commonly used types
pub use domain::model::{
    FramePlan, ParticipantReport, ReadFailurePolicy, Role, SeekMode, SegmentOutcome, SkipReason,
};
pub use error::{ReconError, ReconResult};

/// Initialize the media libraries. Safe to call more than once.
pub fn init() -> ReconResult<()> {
    ffmpeg_next::init().map_err(|e| ReconError::FFmpegInitError {
        message: e.to_string(),
    })?;

    Ok(())
}
