//! Path helpers for capture and output naming conventions

use std::path::{Path, PathBuf};

/// Path utilities for the `_rewrapped` / `_no_black` naming scheme
pub struct PathUtils;

impl PathUtils {
    /// Insert `infix` between the file stem and its extension.
    ///
    /// `a/b/clip.avi` with `_rewrapped` becomes `a/b/clip_rewrapped.avi`.
    pub fn insert_before_extension(path: &Path, infix: &str) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = match path.extension() {
            Some(ext) => format!("{}{}.{}", stem, infix, ext.to_string_lossy()),
            None => format!("{}{}", stem, infix),
        };
        path.with_file_name(file_name)
    }

    /// File name with the first occurrence of `infix` removed, if present
    pub fn strip_infix(file_name: &str, infix: &str) -> Option<String> {
        let start = file_name.find(infix)?;
        let mut stripped = String::with_capacity(file_name.len() - infix.len());
        stripped.push_str(&file_name[..start]);
        stripped.push_str(&file_name[start + infix.len()..]);
        Some(stripped)
    }

    /// File name of `path` as a lossy UTF-8 string
    pub fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Lower-cased extension of `path`
    pub fn extension(path: &Path) -> Option<String> {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// Name of the directory directly containing `path`
    pub fn parent_dir_name(path: &Path) -> Option<String> {
        path.parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }
}
