//! Error handling module for FaceRebuild

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for reconstruction operations
#[derive(Error, Debug)]
pub enum ReconError {
    /// Segment CSV, source video or other required input is absent
    #[error("Not found: {what} ({path})")]
    NotFound { what: String, path: PathBuf },

    /// Segment row or sidecar cannot be used; the segment is skipped
    #[error("Invalid segment '{segment}': {message}")]
    InvalidSegment { segment: String, message: String },

    /// `video_cnt` points past the filtered candidate list
    #[error("Video index {index} out of range: only {available} candidate file(s) for role {role}")]
    IndexOutOfRange {
        index: usize,
        available: usize,
        role: String,
    },

    /// Seek or decode failed at a specific physical frame
    #[error("Failed to read frame {frame}: {message}")]
    ReadFailure { frame: u64, message: String },

    /// Media probe error
    #[error("Failed to probe media file {path}: {message}")]
    ProbeError { path: PathBuf, message: String },

    /// Encoder or muxer failure while writing an output
    #[error("Failed to write output {path}: {message}")]
    OutputError { path: PathBuf, message: String },

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// FFmpeg initialization error
    #[error("Failed to initialize FFmpeg: {message}")]
    FFmpegInitError { message: String },

    /// CSV parse error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// FFmpeg error
    #[error("FFmpeg error: {0}")]
    FFmpegError(#[from] ffmpeg_next::Error),
}

impl ReconError {
    /// Shorthand for a missing input
    pub fn not_found(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            what: what.into(),
            path: path.into(),
        }
    }

    /// Shorthand for a segment that must be skipped
    pub fn invalid_segment(segment: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSegment {
            segment: segment.into(),
            message: message.into(),
        }
    }

    /// Whether this error halts the current participant.
    ///
    /// Only `InvalidSegment` and `ReadFailure` are recoverable: the first skips a
    /// segment, the second drops a single frame.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ReconError::InvalidSegment { .. } | ReconError::ReadFailure { .. }
        )
    }
}

/// Result type alias for reconstruction operations
pub type ReconResult<T> = std::result::Result<T, ReconError>;
