// Participant interactor - Reconstructs every segment of one participant

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn};

use crate::domain::model::*;
use crate::engine::Reconstructor;
use crate::error::ReconResult;
use crate::output::OutputLayout;
use crate::ports::{FrameSource, SinkFactory, SourceOpener};
use crate::resolver::{AnalysisLayout, ParticipantResolver, SourceCatalog};

/// Knobs of a reconstruction run
#[derive(Debug, Clone)]
pub struct ReconstructionSettings {
    pub seek_mode: SeekMode,
    pub read_failure_policy: ReadFailurePolicy,
    pub output_dir_name: String,
    pub output_extension: String,
}

impl Default for ReconstructionSettings {
    fn default() -> Self {
        Self {
            seek_mode: SeekMode::default(),
            read_failure_policy: ReadFailurePolicy::default(),
            output_dir_name: "facial_expression".to_string(),
            output_extension: "mp4".to_string(),
        }
    }
}

/// Interactor for the per-participant reconstruction use case
pub struct ParticipantInteractor {
    opener: Arc<dyn SourceOpener>,
    sinks: Arc<dyn SinkFactory>,
    settings: ReconstructionSettings,
}

/// Source handle kept open across consecutive segments of the same file
struct OpenSource {
    path: PathBuf,
    reader: Box<dyn FrameSource>,
}

impl ParticipantInteractor {
    pub fn new(
        opener: Arc<dyn SourceOpener>,
        sinks: Arc<dyn SinkFactory>,
        settings: ReconstructionSettings,
    ) -> Self {
        Self {
            opener,
            sinks,
            settings,
        }
    }

    /// Process every segment of `participant_id` in CSV order.
    ///
    /// A fatal error stops the participant and is recorded in the report;
    /// outputs already completed stay in place. Recoverable errors skip the
    /// segment as `Unreadable`.
    pub fn run(
        &self,
        layout: &AnalysisLayout,
        catalog: &SourceCatalog,
        participant_id: u32,
    ) -> ParticipantReport {
        let mut report = ParticipantReport::new(participant_id);
        let span = info_span!("participant", participant = participant_id, role = %report.role);
        let _guard = span.enter();

        info!("Starting participant");
        let halted = match self.process(layout, catalog, participant_id, &mut report) {
            Ok(()) => None,
            Err(e) => {
                error!("Participant halted: {}", e);
                Some(e.to_string())
            }
        };
        report.finish(halted);

        info!(
            completed = report.completed_count(),
            skipped = report.skipped_count(),
            "Participant finished"
        );
        report
    }

    fn process(
        &self,
        layout: &AnalysisLayout,
        catalog: &SourceCatalog,
        participant_id: u32,
        report: &mut ParticipantReport,
    ) -> ReconResult<()> {
        let resolver = ParticipantResolver::new(layout, catalog, participant_id, self.settings.seek_mode);
        let segments = resolver.segments()?;
        let outputs = OutputLayout::new(
            layout.root(),
            &self.settings.output_dir_name,
            &self.settings.output_extension,
        );
        outputs.ensure_dir()?;
        debug!(dir = %outputs.dir().display(), segments = segments.len(), "Segments loaded");

        let reconstructor = Reconstructor::new(self.sinks.as_ref())
            .with_read_failure_policy(self.settings.read_failure_policy);
        let mut open: Option<OpenSource> = None;

        for segment in &segments {
            let resolved = resolver.resolve_segment(segment)?;
            let pair = outputs.pair(resolver.participant_id(), resolver.role(), &segment.name);

            if pair.is_complete() {
                info!(segment = %segment.name, "Skipping: {}", SkipReason::AlreadyComplete);
                report.outcomes.push(SegmentOutcome::Skipped {
                    segment: segment.name.clone(),
                    reason: SkipReason::AlreadyComplete,
                });
                continue;
            }

            let plan = match resolved.frames {
                Ok(plan) => plan,
                Err(reason) => {
                    warn!(segment = %segment.name, "Skipping: {}", reason);
                    report.outcomes.push(SegmentOutcome::Skipped {
                        segment: segment.name.clone(),
                        reason,
                    });
                    continue;
                }
            };

            // Reuse the open handle when consecutive segments share a file
            let source = match open.take() {
                Some(current) if current.path == resolved.source => current,
                previous => {
                    drop(previous);
                    OpenSource {
                        reader: self.opener.open(&resolved.source)?,
                        path: resolved.source.clone(),
                    }
                }
            };
            let source = open.insert(source);

            info!(
                segment = %segment.name,
                source = %resolved.source.display(),
                frames = plan.len(),
                "Reconstructing segment"
            );
            match reconstructor.run(&segment.name, source.reader.as_mut(), &plan, &pair) {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) if !e.is_fatal() => {
                    warn!(segment = %segment.name, "Skipping: {}", e);
                    report.outcomes.push(SegmentOutcome::Skipped {
                        segment: segment.name.clone(),
                        reason: SkipReason::Unreadable(e.to_string()),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}
