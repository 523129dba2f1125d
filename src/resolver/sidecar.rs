//! Sidecar frame-list files: comma-separated integers, no header

use std::path::Path;

use crate::domain::model::SkipReason;

/// Parse sidecar text into declared frame values.
///
/// Surrounding whitespace and line breaks are ignored, as are empty tokens
/// left by a trailing comma.
pub fn parse_frame_list(content: &str) -> Result<Vec<i64>, SkipReason> {
    content
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<i64>()
                .map_err(|_| SkipReason::MalformedSidecar(format!("'{}' is not an integer", token)))
        })
        .collect()
}

/// Load a sidecar file, mapping a missing or unreadable file to a skip reason
pub fn load_frame_list(path: &Path) -> Result<Vec<i64>, SkipReason> {
    if !path.is_file() {
        return Err(SkipReason::MissingSidecar);
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| SkipReason::MalformedSidecar(e.to_string()))?;
    let values = parse_frame_list(&content)?;
    if values.is_empty() {
        return Err(SkipReason::EmptyFrameList);
    }
    Ok(values)
}
