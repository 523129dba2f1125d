// Domain models - Core types and data structures

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ReconError, ReconResult};

/// Substring marking a losslessly rewrapped capture file
pub const REWRAPPED_INFIX: &str = "_rewrapped";

/// Substring marking the filler-free output of a segment
pub const NO_BLACK_INFIX: &str = "_no_black";

/// Participant seat, derived from id parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Navigator,
    Pilot,
}

impl Role {
    /// Odd ids are navigators, even ids are pilots
    pub fn for_participant(participant_id: u32) -> Self {
        if participant_id % 2 != 0 {
            Role::Navigator
        } else {
            Role::Pilot
        }
    }

    /// Token used in file names
    pub fn token(&self) -> &'static str {
        match self {
            Role::Navigator => "navigator",
            Role::Pilot => "pilot",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One row of a participant's segment CSV
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    /// Segment identifier, used in sidecar and output names
    pub name: String,
    /// Physical frame offset; `None` when the cell was empty or NaN
    pub start_frame: Option<i64>,
    /// Last physical frame of the segment (informational)
    pub finish_frame: Option<i64>,
    /// Index into the role's filtered candidate files
    pub video_cnt: Option<usize>,
}

/// How the physical seek position of each entry is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeekMode {
    /// Seek to the declared frame: `value + start_frame`
    #[default]
    Declared,
    /// Seek to `position + start_frame`, ignoring the declared value
    Sequential,
}

impl SeekMode {
    /// Parse seek mode from string
    pub fn parse(mode: &str) -> ReconResult<Self> {
        match mode.trim().to_lowercase().as_str() {
            "declared" => Ok(SeekMode::Declared),
            "sequential" => Ok(SeekMode::Sequential),
            other => Err(ReconError::ConfigError {
                message: format!(
                    "Invalid seek mode: {}. Valid modes: declared, sequential",
                    other
                ),
            }),
        }
    }
}

/// What the full stream receives when a declared frame cannot be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadFailurePolicy {
    /// Drop the frame from both streams
    #[default]
    Omit,
    /// Write a filler frame into the full stream in its place
    Fill,
}

impl ReadFailurePolicy {
    /// Parse policy from string
    pub fn parse(policy: &str) -> ReconResult<Self> {
        match policy.trim().to_lowercase().as_str() {
            "omit" => Ok(ReadFailurePolicy::Omit),
            "fill" => Ok(ReadFailurePolicy::Fill),
            other => Err(ReconError::ConfigError {
                message: format!(
                    "Invalid read failure policy: {}. Valid policies: omit, fill",
                    other
                ),
            }),
        }
    }
}

/// A single resolved frame: where to seek, and what to measure gaps against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameEntry {
    /// Physical frame the source is positioned on before reading
    pub seek_target: u64,
    /// Declared logical value from the sidecar
    pub gap_basis: i64,
}

/// Resolved frame list of one segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FramePlan {
    pub start_frame: i64,
    pub entries: Vec<FrameEntry>,
}

impl FramePlan {
    /// Build the plan from sidecar values, computing every seek target once
    pub fn from_sidecar(
        segment: &str,
        start_frame: i64,
        values: &[i64],
        seek_mode: SeekMode,
    ) -> ReconResult<Self> {
        let mut entries = Vec::with_capacity(values.len());
        for (position, &value) in values.iter().enumerate() {
            let declared = value.checked_add(start_frame).ok_or_else(|| {
                ReconError::invalid_segment(
                    segment,
                    format!("frame {} overflows with start {}", value, start_frame),
                )
            })?;
            let physical = match seek_mode {
                SeekMode::Declared => declared,
                SeekMode::Sequential => (position as i64).checked_add(start_frame).ok_or_else(|| {
                    ReconError::invalid_segment(
                        segment,
                        format!("position {} overflows with start {}", position, start_frame),
                    )
                })?,
            };
            let seek_target = u64::try_from(physical).map_err(|_| {
                ReconError::invalid_segment(
                    segment,
                    format!("frame {} resolves to negative position {}", value, physical),
                )
            })?;
            entries.push(FrameEntry {
                seek_target,
                gap_basis: value,
            });
        }
        Ok(Self {
            start_frame,
            entries,
        })
    }

    /// Absolute physical frame numbers as declared
    pub fn absolute_frames(&self) -> Vec<i64> {
        self.entries
            .iter()
            .map(|entry| entry.gap_basis + self.start_frame)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Frame rate as a rational number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameRate {
    pub num: i32,
    pub den: i32,
}

impl FrameRate {
    pub fn new(num: i32, den: i32) -> ReconResult<Self> {
        if num <= 0 || den <= 0 {
            return Err(ReconError::ConfigError {
                message: format!("Invalid frame rate {}/{}", num, den),
            });
        }
        Ok(Self { num, den })
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.as_f64())
    }
}

/// Dimensions and timing of a video source
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VideoGeometry {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    /// Frames reported by the container; 0 when the metadata is unreadable
    pub frame_count: u64,
}

/// Where a frame handed to a sink came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOrigin {
    Source(u64),
    Filler,
}

/// Packed BGR24 picture, `height * width * 3` bytes
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub origin: FrameOrigin,
}

impl RawFrame {
    /// Bytes per pixel of the packed layout
    pub const CHANNELS: usize = 3;

    /// All-zero placeholder frame matching the given dimensions
    pub fn filler(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * Self::CHANNELS],
            origin: FrameOrigin::Filler,
        }
    }

    pub fn from_source(width: u32, height: u32, data: Vec<u8>, frame: u64) -> ReconResult<Self> {
        let expected = width as usize * height as usize * Self::CHANNELS;
        if data.len() != expected {
            return Err(ReconError::ReadFailure {
                frame,
                message: format!(
                    "picture buffer has {} bytes, expected {} for {}x{}",
                    data.len(),
                    expected,
                    width,
                    height
                ),
            });
        }
        Ok(Self {
            width,
            height,
            data,
            origin: FrameOrigin::Source(frame),
        })
    }

    pub fn is_filler(&self) -> bool {
        self.origin == FrameOrigin::Filler
    }

    /// Row stride in bytes
    pub fn stride(&self) -> usize {
        self.width as usize * Self::CHANNELS
    }
}

/// Why a segment produced no new outputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Both outputs already exist
    AlreadyComplete,
    /// `start_frame` was empty or NaN
    MissingStartFrame,
    /// No sidecar frame-list file for the segment
    MissingSidecar,
    /// Sidecar content could not be parsed
    MalformedSidecar(String),
    /// Sidecar parsed to no frames
    EmptyFrameList,
    /// The segment failed without halting the participant
    Unreadable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyComplete => write!(f, "outputs already exist"),
            SkipReason::MissingStartFrame => write!(f, "empty start_frame"),
            SkipReason::MissingSidecar => write!(f, "sidecar frame list not found"),
            SkipReason::MalformedSidecar(msg) => write!(f, "malformed sidecar: {}", msg),
            SkipReason::EmptyFrameList => write!(f, "sidecar frame list is empty"),
            SkipReason::Unreadable(msg) => write!(f, "segment unreadable: {}", msg),
        }
    }
}

/// Counters for one reconstructed segment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconstructionStats {
    /// Entries in the frame plan
    pub declared: usize,
    /// Source frames decoded and written to both streams
    pub sources_written: usize,
    /// Filler frames written to the full stream
    pub fillers_written: usize,
    /// Declared frames that could not be read
    pub read_failures: usize,
}

impl ReconstructionStats {
    /// Frames in the full stream
    pub fn full_len(&self) -> usize {
        self.sources_written + self.fillers_written
    }

    /// Frames in the filler-free stream
    pub fn no_black_len(&self) -> usize {
        self.sources_written
    }
}

/// Structured result of one segment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SegmentOutcome {
    Completed {
        segment: String,
        source: PathBuf,
        stats: ReconstructionStats,
    },
    Skipped {
        segment: String,
        reason: SkipReason,
    },
}

impl SegmentOutcome {
    pub fn segment(&self) -> &str {
        match self {
            SegmentOutcome::Completed { segment, .. } | SegmentOutcome::Skipped { segment, .. } => {
                segment
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, SegmentOutcome::Completed { .. })
    }
}

/// Everything that happened while processing one participant
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantReport {
    pub participant_id: u32,
    pub role: Role,
    pub outcomes: Vec<SegmentOutcome>,
    /// Fatal error that stopped the participant, if any
    pub halted: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ParticipantReport {
    pub fn new(participant_id: u32) -> Self {
        Self {
            participant_id,
            role: Role::for_participant(participant_id),
            outcomes: Vec::new(),
            halted: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn finish(&mut self, halted: Option<String>) {
        self.halted = halted;
        self.finished_at = Some(Utc::now());
    }

    pub fn completed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.completed_count()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }
}
