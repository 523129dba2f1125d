//! Segment descriptor CSV loading

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::model::Segment;
use crate::error::{ReconError, ReconResult};

/// Raw CSV row; numeric cells stay textual so empty and `NaN` cells survive
#[derive(Debug, Deserialize)]
struct SegmentRow {
    name: String,
    #[serde(default)]
    start_frame: Option<String>,
    #[serde(default)]
    finish_frame: Option<String>,
    #[serde(default)]
    video_cnt: Option<String>,
}

/// Read every segment of a participant's CSV, in file order
pub fn load_segments(csv_path: &Path) -> ReconResult<Vec<Segment>> {
    if !csv_path.is_file() {
        return Err(ReconError::not_found("segment CSV", csv_path));
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(csv_path)?;

    let mut segments = Vec::new();
    for row in reader.deserialize::<SegmentRow>() {
        let row = row?;
        let video_cnt = match parse_integer_cell(row.video_cnt.as_deref()) {
            Some(v) if v >= 0 => Some(v as usize),
            Some(v) => {
                warn!("Ignoring negative video_cnt {} for segment {}", v, row.name);
                None
            }
            None => None,
        };
        segments.push(Segment {
            start_frame: parse_integer_cell(row.start_frame.as_deref()),
            finish_frame: parse_integer_cell(row.finish_frame.as_deref()),
            video_cnt,
            name: row.name,
        });
    }

    debug!("Loaded {} segment(s) from {}", segments.len(), csv_path.display());
    Ok(segments)
}

/// Parse an integer CSV cell.
///
/// Empty and `NaN` cells are `None`. Whole floats such as `100.0`, as written
/// by dataframe exports of columns with missing values, are accepted.
pub fn parse_integer_cell(cell: Option<&str>) -> Option<i64> {
    let text = cell?.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("nan") {
        return None;
    }
    if let Ok(value) = text.parse::<i64>() {
        return Some(value);
    }
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => Some(value as i64),
        _ => None,
    }
}
