//! Frame index resolution
//!
//! Maps a participant's segment rows to physical source files and absolute
//! frame plans. Nothing here touches media; the reconstructor consumes the
//! result.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::domain::model::*;
use crate::error::ReconResult;

pub mod catalog;
pub mod segments;
pub mod sidecar;

pub use catalog::SourceCatalog;

/// Input file layout under an analysis root
#[derive(Debug, Clone)]
pub struct AnalysisLayout {
    root: PathBuf,
}

impl AnalysisLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `root/Video/pp{id}_{role}_video_frames.csv`
    pub fn segment_csv(&self, participant_id: u32, role: Role) -> PathBuf {
        self.root
            .join("Video")
            .join(format!("pp{}_{}_video_frames.csv", participant_id, role))
    }

    /// `root/pp{id}_{role}_{name}_video_frames.txt`
    pub fn sidecar(&self, participant_id: u32, role: Role, segment: &str) -> PathBuf {
        self.root
            .join(format!("pp{}_{}_{}_video_frames.txt", participant_id, role, segment))
    }
}

/// A segment with its source chosen and its frame list loaded, or the reason
/// it cannot be reconstructed
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSegment {
    pub segment: Segment,
    pub source: PathBuf,
    pub frames: Result<FramePlan, SkipReason>,
}

/// Resolves the segments of one participant
pub struct ParticipantResolver<'a> {
    layout: &'a AnalysisLayout,
    catalog: &'a SourceCatalog,
    seek_mode: SeekMode,
    participant_id: u32,
    role: Role,
}

impl<'a> ParticipantResolver<'a> {
    pub fn new(
        layout: &'a AnalysisLayout,
        catalog: &'a SourceCatalog,
        participant_id: u32,
        seek_mode: SeekMode,
    ) -> Self {
        Self {
            layout,
            catalog,
            seek_mode,
            participant_id,
            role: Role::for_participant(participant_id),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn participant_id(&self) -> u32 {
        self.participant_id
    }

    /// Segment rows of the participant; a missing CSV is fatal
    pub fn segments(&self) -> ReconResult<Vec<Segment>> {
        segments::load_segments(&self.layout.segment_csv(self.participant_id, self.role))
    }

    /// Choose the source and load the frame plan for one segment.
    ///
    /// Source selection errors are returned as `Err` and halt the participant;
    /// problems with the row or its sidecar come back inside `frames`.
    pub fn resolve_segment(&self, segment: &Segment) -> ReconResult<ResolvedSegment> {
        let source = self.catalog.select(self.role, segment.video_cnt)?;
        let frames = self.frame_plan(segment);
        debug!(
            participant = self.participant_id,
            segment = %segment.name,
            source = %source.display(),
            "Resolved segment"
        );
        Ok(ResolvedSegment {
            segment: segment.clone(),
            source,
            frames,
        })
    }

    /// Resolve every segment, stopping at the first fatal error.
    ///
    /// Segments resolved before the failure are returned alongside it.
    pub fn resolve_all(&self) -> (Vec<ResolvedSegment>, Option<crate::error::ReconError>) {
        let segments = match self.segments() {
            Ok(segments) => segments,
            Err(e) => return (Vec::new(), Some(e)),
        };
        let mut resolved = Vec::with_capacity(segments.len());
        for segment in &segments {
            match self.resolve_segment(segment) {
                Ok(r) => resolved.push(r),
                Err(e) => return (resolved, Some(e)),
            }
        }
        (resolved, None)
    }

    fn frame_plan(&self, segment: &Segment) -> Result<FramePlan, SkipReason> {
        let start_frame = segment.start_frame.ok_or(SkipReason::MissingStartFrame)?;
        let sidecar_path = self
            .layout
            .sidecar(self.participant_id, self.role, &segment.name);
        let values = sidecar::load_frame_list(&sidecar_path)?;
        FramePlan::from_sidecar(&segment.name, start_frame, &values, self.seek_mode)
            .map_err(|e| SkipReason::MalformedSidecar(e.to_string()))
    }
}
