//! Utility functions for path derivation and display formatting

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Reserved suffix marking an in-progress partial file.
///
/// Final file names never carry this suffix, so partial files cannot
/// collide with a legitimate final name.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Derive the opaque partial-file name for a remote node.
///
/// The name is the first 16 hex characters of the SHA-256 digest of the
/// node ID plus [`PARTIAL_SUFFIX`]. Deriving it from the node ID (rather
/// than a per-run random string) keeps it stable across retries and
/// across process restarts, which is what makes leftover partial files
/// resumable at all.
pub fn partial_file_name(node_id: &str) -> String {
    let digest = Sha256::digest(node_id.as_bytes());
    let mut name = String::with_capacity(16 + PARTIAL_SUFFIX.len());
    for byte in digest.iter().take(8) {
        name.push_str(&format!("{:02x}", byte));
    }
    name.push_str(PARTIAL_SUFFIX);
    name
}

/// Full partial-file path for a node staged into `dir`.
pub fn partial_path(dir: &Path, node_id: &str) -> PathBuf {
    dir.join(partial_file_name(node_id))
}

/// Whether a path carries the reserved partial suffix.
pub fn is_partial_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(PARTIAL_SUFFIX))
}

/// Format a byte count for human display using binary multiples.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
