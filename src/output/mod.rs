//! Output layout and completion checks

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::model::{Role, NO_BLACK_INFIX};
use crate::error::{ReconError, ReconResult};
use crate::utils::path::PathUtils;

pub mod writer;

/// Where reconstructed videos are written under an analysis root
#[derive(Debug, Clone)]
pub struct OutputLayout {
    dir: PathBuf,
    extension: String,
}

impl OutputLayout {
    /// `analysis_root/<dir_name>`, files with the given extension
    pub fn new(analysis_root: &Path, dir_name: &str, extension: &str) -> Self {
        Self {
            dir: analysis_root.join(dir_name),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Output pair of one segment
    pub fn pair(&self, participant_id: u32, role: Role, segment: &str) -> OutputPair {
        let reconstructed = self.dir.join(format!(
            "pp{}_{}_{}_reconstructed_video.{}",
            participant_id, role, segment, self.extension
        ));
        let no_black = PathUtils::insert_before_extension(&reconstructed, NO_BLACK_INFIX);
        OutputPair {
            reconstructed,
            no_black,
        }
    }

    /// Create the output directory if absent
    pub fn ensure_dir(&self) -> ReconResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| ReconError::OutputError {
            path: self.dir.clone(),
            message: format!("Failed to create output directory: {}", e),
        })
    }
}

/// The two artifacts of a segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPair {
    /// Full timeline, fillers included
    pub reconstructed: PathBuf,
    /// Only frames that were actually read
    pub no_black: PathBuf,
}

impl OutputPair {
    /// Both files exist, so the segment needs no work
    pub fn is_complete(&self) -> bool {
        self.reconstructed.is_file() && self.no_black.is_file()
    }
}
