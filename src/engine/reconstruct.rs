//! Gap-filling reconstruction of one segment

use std::time::Instant;

use tracing::{debug, info};

use crate::domain::model::*;
use crate::domain::rules::{Emission, EmissionPlanner};
use crate::error::{ReconError, ReconResult};
use crate::output::OutputPair;
use crate::ports::{FrameSink, FrameSource, SinkFactory};

/// Log progress every this many emitted frames
const PROGRESS_INTERVAL: usize = 500;

/// Writes the full and filler-free streams of a segment
pub struct Reconstructor<'a> {
    sinks: &'a dyn SinkFactory,
    read_failure_policy: ReadFailurePolicy,
}

impl<'a> Reconstructor<'a> {
    pub fn new(sinks: &'a dyn SinkFactory) -> Self {
        Self {
            sinks,
            read_failure_policy: ReadFailurePolicy::default(),
        }
    }

    pub fn with_read_failure_policy(mut self, policy: ReadFailurePolicy) -> Self {
        self.read_failure_policy = policy;
        self
    }

    /// Reconstruct `plan` from `source` into `outputs`.
    ///
    /// Returns `Skipped(AlreadyComplete)` without touching anything when both
    /// outputs exist. Outputs only appear at their final paths once both
    /// streams are finalized; on error neither is left behind. A segment with
    /// no readable source frame is an `InvalidSegment`.
    pub fn run(
        &self,
        segment: &str,
        source: &mut dyn FrameSource,
        plan: &FramePlan,
        outputs: &OutputPair,
    ) -> ReconResult<SegmentOutcome> {
        if outputs.is_complete() {
            return Ok(SegmentOutcome::Skipped {
                segment: segment.to_string(),
                reason: SkipReason::AlreadyComplete,
            });
        }

        let stats = self.reconstruct(segment, source, plan, outputs)?;
        Ok(SegmentOutcome::Completed {
            segment: segment.to_string(),
            source: source.path().to_path_buf(),
            stats,
        })
    }

    fn reconstruct(
        &self,
        segment: &str,
        source: &mut dyn FrameSource,
        plan: &FramePlan,
        outputs: &OutputPair,
    ) -> ReconResult<ReconstructionStats> {
        let started = Instant::now();
        let geometry = source.geometry();
        let emissions = EmissionPlanner::plan(plan);

        info!(
            segment,
            declared = plan.len(),
            timeline = EmissionPlanner::timeline_len(&emissions),
            "Reconstructing {}x{} @ {} fps",
            geometry.width,
            geometry.height,
            geometry.frame_rate
        );

        let mut full = self.sinks.create(&outputs.reconstructed, &geometry)?;
        let mut no_black = self.sinks.create(&outputs.no_black, &geometry)?;
        let filler = RawFrame::filler(geometry.width, geometry.height);

        let mut stats = ReconstructionStats {
            declared: plan.len(),
            ..Default::default()
        };

        for emission in &emissions {
            match *emission {
                Emission::Filler { count } => {
                    for _ in 0..count {
                        full.write(&filler)?;
                        stats.fillers_written += 1;
                    }
                }
                Emission::Source { seek_target, entry } => {
                    self.emit_source(
                        source,
                        seek_target,
                        entry,
                        &filler,
                        full.as_mut(),
                        no_black.as_mut(),
                        &mut stats,
                    )?;
                }
            }

            if stats.full_len() > 0 && stats.full_len() % PROGRESS_INTERVAL == 0 {
                debug!(segment, written = stats.full_len(), "Reconstruction progress");
            }
        }

        // Nothing usable came out of the source; the sinks are dropped unfinished
        if stats.sources_written == 0 {
            return Err(ReconError::invalid_segment(
                segment,
                format!("none of the {} declared frames could be read", plan.len()),
            ));
        }

        full.finish()?;
        no_black.finish()?;

        info!(
            segment,
            sources = stats.sources_written,
            fillers = stats.fillers_written,
            read_failures = stats.read_failures,
            "Segment reconstructed in {:.2}s",
            started.elapsed().as_secs_f64()
        );
        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_source(
        &self,
        source: &mut dyn FrameSource,
        seek_target: u64,
        entry: usize,
        filler: &RawFrame,
        full: &mut dyn FrameSink,
        no_black: &mut dyn FrameSink,
        stats: &mut ReconstructionStats,
    ) -> ReconResult<()> {
        match source.read_at(seek_target) {
            Ok(frame) => {
                full.write(&frame)?;
                no_black.write(&frame)?;
                stats.sources_written += 1;
            }
            Err(ReconError::ReadFailure { frame, message }) => {
                stats.read_failures += 1;
                debug!(entry, frame, "Read failure: {}", message);
                if self.read_failure_policy == ReadFailurePolicy::Fill {
                    full.write(filler)?;
                    stats.fillers_written += 1;
                }
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}
