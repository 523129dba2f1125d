//! Candidate source files and per-role selection

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::domain::model::{Role, REWRAPPED_INFIX};
use crate::error::{ReconError, ReconResult};
use crate::utils::path::PathUtils;

/// Ordered set of capture files a participant's segments can point into
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    files: Vec<PathBuf>,
}

impl SourceCatalog {
    /// Build a catalog from an explicit list, keeping the given order
    pub fn from_paths(files: Vec<PathBuf>) -> Self {
        Self { files }
    }

    /// Walk `dir` for files with one of `extensions`, sorted by path
    pub fn discover(dir: &Path, extensions: &[String]) -> ReconResult<Self> {
        if !dir.is_dir() {
            return Err(ReconError::not_found("source directory", dir));
        }

        let wanted: HashSet<String> = extensions.iter().map(|e| e.to_lowercase()).collect();
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(|e| ReconError::IoError(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let matches = PathUtils::extension(entry.path())
                .map(|ext| wanted.contains(&ext))
                .unwrap_or(false);
            if matches {
                files.push(entry.into_path());
            }
        }
        files.sort();

        info!("Discovered {} candidate video file(s) under {}", files.len(), dir.display());
        Ok(Self { files })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files for `role`, with raw captures dropped when a rewrapped copy exists
    pub fn candidates_for(&self, role: Role) -> Vec<PathBuf> {
        let role_files: Vec<&PathBuf> = self
            .files
            .iter()
            .filter(|p| PathUtils::file_name(p).contains(role.token()))
            .collect();

        let superseded: HashSet<PathBuf> = role_files
            .iter()
            .filter_map(|p| {
                let raw_name = PathUtils::strip_infix(&PathUtils::file_name(p), REWRAPPED_INFIX)?;
                Some(p.with_file_name(raw_name))
            })
            .collect();

        role_files
            .into_iter()
            .filter(|p| !superseded.contains(*p))
            .cloned()
            .collect()
    }

    /// Pick the physical source for a segment.
    ///
    /// With `video_cnt` the index is applied to the filtered candidate list and
    /// must be in range; without it the first candidate is used.
    pub fn select(&self, role: Role, video_cnt: Option<usize>) -> ReconResult<PathBuf> {
        let candidates = self.candidates_for(role);
        debug!("{} candidate(s) for role {}", candidates.len(), role);

        match video_cnt {
            Some(index) => {
                let available = candidates.len();
                candidates
                    .into_iter()
                    .nth(index)
                    .ok_or_else(|| ReconError::IndexOutOfRange {
                        index,
                        available,
                        role: role.to_string(),
                    })
            }
            None => candidates.into_iter().next().ok_or_else(|| {
                ReconError::not_found(format!("source video for role {}", role), PathBuf::new())
            }),
        }
    }
}
