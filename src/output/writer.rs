//! Staged output files
//!
//! Encoders write into a temporary file next to the destination; the file is
//! renamed into place only once the container is finalized. Dropping a staged
//! output without committing deletes the temporary file.

use std::path::{Path, PathBuf};

use tempfile::{Builder, TempPath};
use tracing::debug;

use crate::error::{ReconError, ReconResult};
use crate::utils::path::PathUtils;

/// A not-yet-committed output file
#[derive(Debug)]
pub struct StagedOutput {
    temp: TempPath,
    destination: PathBuf,
}

impl StagedOutput {
    /// Reserve a temporary file in the destination's directory.
    ///
    /// The temporary name keeps the destination extension so muxers can
    /// infer the container format from it.
    pub fn new(destination: &Path) -> ReconResult<Self> {
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| ReconError::OutputError {
            path: destination.to_path_buf(),
            message: format!("Failed to create output directory: {}", e),
        })?;

        let suffix = PathUtils::extension(destination)
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        let temp = Builder::new()
            .prefix(".partial_")
            .suffix(&suffix)
            .tempfile_in(&dir)
            .map_err(|e| ReconError::OutputError {
                path: destination.to_path_buf(),
                message: format!("Failed to create temporary file: {}", e),
            })?
            .into_temp_path();

        debug!("Staging {} at {}", destination.display(), temp.display());
        Ok(Self {
            temp,
            destination: destination.to_path_buf(),
        })
    }

    /// Path encoders should write to
    pub fn path(&self) -> &Path {
        &self.temp
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Move the finished file to its destination
    pub fn commit(self) -> ReconResult<PathBuf> {
        let destination = self.destination;
        self.temp
            .persist(&destination)
            .map_err(|e| ReconError::OutputError {
                path: destination.clone(),
                message: format!("Failed to move output into place: {}", e.error),
            })?;
        Ok(destination)
    }
}
