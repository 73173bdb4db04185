//! Progress/outcome ledger — shared counters behind the final report.
//!
//! Workers and the tree walker append concurrently; the snapshot is
//! destructive and therefore taken exactly once per reporting point,
//! after all workers are known idle (or the run was interrupted).

use crate::utils::format_bytes;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe append-only collections for run accounting.
#[derive(Default)]
pub struct Ledger {
    existing: Mutex<Vec<PathBuf>>,
    finished: Mutex<Vec<PathBuf>>,
    partials: Mutex<Vec<PathBuf>>,
    errors: Mutex<Vec<String>>,
    /// Largest subtree size observed during discovery; the root's
    /// cumulative size, i.e. the expected byte total of the run.
    expected: AtomicU64,
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file that already existed on disk and was skipped.
    pub fn record_existing(&self, path: PathBuf) {
        lock(&self.existing).push(path);
    }

    /// Record a successfully promoted file.
    pub fn record_finished(&self, path: PathBuf) {
        lock(&self.finished).push(path);
    }

    /// Track the partial file of an attempt that is about to run, so an
    /// interrupted run still accounts for in-flight bytes.
    pub fn track_partial(&self, path: PathBuf) {
        let mut partials = lock(&self.partials);
        if !partials.contains(&path) {
            partials.push(path);
        }
    }

    /// Append a free-text error message.
    pub fn record_error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(error = %message, "recorded transfer error");
        lock(&self.errors).push(message);
    }

    /// Observe a node size during discovery; the maximum observed is the
    /// expected byte total of the whole run.
    pub fn observe_expected(&self, size: u64) {
        self.expected.fetch_max(size, Ordering::SeqCst);
    }

    /// Number of errors recorded so far (non-destructive).
    pub fn error_count(&self) -> usize {
        lock(&self.errors).len()
    }

    /// Drain the ledger into a [`RunStats`] report.
    ///
    /// Destructive: the collections are emptied, so this must run exactly
    /// once per reporting point. Paths that no longer exist (e.g. a
    /// partial promoted after being tracked) count as zero bytes.
    pub fn snapshot(&self, complete: bool) -> RunStats {
        let existing: Vec<PathBuf> = std::mem::take(&mut *lock(&self.existing));
        let finished: Vec<PathBuf> = std::mem::take(&mut *lock(&self.finished));
        let partials: Vec<PathBuf> = std::mem::take(&mut *lock(&self.partials));
        let errors: Vec<String> = std::mem::take(&mut *lock(&self.errors));

        let (existing_files, existing_bytes) = tally(&existing);
        let (finished_files, finished_bytes) = tally(&finished);
        let (partial_files, partial_bytes) = tally(&partials);
        let expected_bytes = self.expected.load(Ordering::SeqCst);
        let accounted = existing_bytes + finished_bytes + partial_bytes;

        RunStats {
            complete,
            existing_files,
            existing_bytes,
            finished_files,
            finished_bytes,
            partial_files,
            partial_bytes,
            expected_bytes,
            unaccounted_bytes: expected_bytes.saturating_sub(accounted),
            errors,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Count files and sum on-disk bytes; missing paths contribute zero.
fn tally(paths: &[PathBuf]) -> (usize, u64) {
    let bytes = paths.iter().map(|p| stat_len(p)).sum();
    (paths.len(), bytes)
}

fn stat_len(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Aggregated end-of-run statistics.
#[derive(Clone, Debug)]
pub struct RunStats {
    /// False when the run was interrupted; the report is then explicitly
    /// marked incomplete.
    pub complete: bool,
    /// Files that already existed and were skipped
    pub existing_files: usize,
    /// On-disk bytes of the pre-existing files
    pub existing_bytes: u64,
    /// Files downloaded and promoted this run
    pub finished_files: usize,
    /// On-disk bytes of the finished files
    pub finished_bytes: u64,
    /// Partial files still on disk (resumable by a later run)
    pub partial_files: usize,
    /// On-disk bytes of the partial files
    pub partial_bytes: u64,
    /// Expected byte total of the whole tree (largest size observed)
    pub expected_bytes: u64,
    /// Expected bytes not covered by any of the categories above
    pub unaccounted_bytes: u64,
    /// Accumulated error messages
    pub errors: Vec<String>,
}

impl RunStats {
    /// Whether any transfer ultimately failed.
    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Process exit code for this run: 0 on full success, the generic 1
    /// when the run was interrupted or any transfer failed terminally.
    pub fn exit_code(&self) -> u8 {
        if self.complete && !self.has_failures() {
            0
        } else {
            1
        }
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.complete {
            writeln!(f, "mirror statistics:")?;
        } else {
            writeln!(f, "mirror statistics (INCOMPLETE - run was interrupted):")?;
        }
        writeln!(
            f,
            "  pre-existing: {} file(s), {}",
            self.existing_files,
            format_bytes(self.existing_bytes)
        )?;
        writeln!(
            f,
            "  downloaded:   {} file(s), {}",
            self.finished_files,
            format_bytes(self.finished_bytes)
        )?;
        writeln!(
            f,
            "  partial:      {} file(s), {}",
            self.partial_files,
            format_bytes(self.partial_bytes)
        )?;
        writeln!(f, "  expected:     {}", format_bytes(self.expected_bytes))?;
        writeln!(
            f,
            "  unaccounted:  {}",
            format_bytes(self.unaccounted_bytes)
        )?;
        write!(f, "  errors:       {}", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n    - {}", error)?;
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_tallies_counts_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        std::fs::write(&a, vec![0u8; 100]).unwrap();
        std::fs::write(&b, vec![0u8; 50]).unwrap();

        let ledger = Ledger::new();
        ledger.record_finished(a);
        ledger.record_existing(b);
        ledger.observe_expected(200);

        let stats = ledger.snapshot(true);
        assert_eq!(stats.finished_files, 1);
        assert_eq!(stats.finished_bytes, 100);
        assert_eq!(stats.existing_files, 1);
        assert_eq!(stats.existing_bytes, 50);
        assert_eq!(stats.expected_bytes, 200);
        assert_eq!(stats.unaccounted_bytes, 50);
        assert!(!stats.has_failures());
    }

    #[test]
    fn snapshot_is_destructive() {
        let ledger = Ledger::new();
        ledger.record_error("boom");

        let first = ledger.snapshot(true);
        assert_eq!(first.errors.len(), 1);

        let second = ledger.snapshot(true);
        assert!(second.errors.is_empty(), "collections must drain once");
        assert_eq!(second.finished_files, 0);
    }

    #[test]
    fn missing_paths_count_as_zero_bytes() {
        let ledger = Ledger::new();
        ledger.track_partial(PathBuf::from("/definitely/not/here.partial"));

        let stats = ledger.snapshot(true);
        assert_eq!(stats.partial_files, 1);
        assert_eq!(stats.partial_bytes, 0);
    }

    #[test]
    fn partial_tracking_deduplicates() {
        let ledger = Ledger::new();
        let path = PathBuf::from("/tmp/x.partial");
        ledger.track_partial(path.clone());
        ledger.track_partial(path);

        let stats = ledger.snapshot(true);
        assert_eq!(stats.partial_files, 1);
    }

    #[test]
    fn expected_total_keeps_the_maximum() {
        let ledger = Ledger::new();
        ledger.observe_expected(10);
        ledger.observe_expected(500);
        ledger.observe_expected(70);
        assert_eq!(ledger.snapshot(true).expected_bytes, 500);
    }

    #[test]
    fn incomplete_report_is_marked() {
        let ledger = Ledger::new();
        let rendered = ledger.snapshot(false).to_string();
        assert!(rendered.contains("INCOMPLETE"));
    }
}
