// Domain rules - Gap detection and emission planning

use serde::Serialize;

use crate::domain::model::*;

/// One step of the reconstruction loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Emission {
    /// Write `count` filler frames to the full stream
    Filler { count: u64 },
    /// Seek to `seek_target`, read one frame, write it to both streams
    Source { seek_target: u64, entry: usize },
}

/// Turns a frame plan into the ordered list of writes
pub struct EmissionPlanner;

impl EmissionPlanner {
    /// Plan every emission for the given frame plan.
    ///
    /// Fillers are inserted before entry `i` when its declared value is more
    /// than one past entry `i - 1`. The first entry never gets fillers, and a
    /// non-ascending pair is treated as contiguous.
    pub fn plan(plan: &FramePlan) -> Vec<Emission> {
        let mut emissions = Vec::with_capacity(plan.len());
        let mut previous: Option<i64> = None;

        for (entry, frame) in plan.entries.iter().enumerate() {
            if let Some(gap) = previous.and_then(|prev| Self::missing_between(prev, frame.gap_basis)) {
                emissions.push(Emission::Filler { count: gap });
            }
            emissions.push(Emission::Source {
                seek_target: frame.seek_target,
                entry,
            });
            previous = Some(frame.gap_basis);
        }

        emissions
    }

    /// Number of frames missing between two consecutive declared values
    pub fn missing_between(previous: i64, current: i64) -> Option<u64> {
        let diff = current.checked_sub(previous)?;
        if diff > 1 {
            Some((diff - 1) as u64)
        } else {
            None
        }
    }

    /// Total filler frames the plan will emit
    pub fn filler_total(emissions: &[Emission]) -> u64 {
        emissions
            .iter()
            .map(|e| match e {
                Emission::Filler { count } => *count,
                Emission::Source { .. } => 0,
            })
            .sum()
    }

    /// Length of the full stream when every read succeeds
    pub fn timeline_len(emissions: &[Emission]) -> u64 {
        emissions
            .iter()
            .map(|e| match e {
                Emission::Filler { count } => *count,
                Emission::Source { .. } => 1,
            })
            .sum()
    }
}
