//! Stale partial-file sweep.
//!
//! Partial files from earlier, unrelated runs accumulate in the
//! destination tree when runs are interrupted. Once discovery has fixed
//! the set of partial paths the current run can resume, everything else
//! bearing the reserved suffix is garbage and removed.

use crate::utils;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Delete unclaimed partial files below `root`. Returns how many were
/// removed; individual failures are logged and skipped.
pub(super) fn sweep_stale_partials(root: &Path, claimed: &HashSet<PathBuf>) -> usize {
    let mut removed = 0;

    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() || !utils::is_partial_file(entry.path()) {
            continue;
        }
        if claimed.contains(entry.path()) {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                tracing::debug!(path = %entry.path().display(), "removed stale partial file");
                removed += 1;
            }
            Err(e) => {
                tracing::warn!(
                    path = %entry.path().display(),
                    error = %e,
                    "failed to remove stale partial file"
                );
            }
        }
    }

    removed
}
