//! Shared test helpers for creating ShareMirror instances in tests.

use crate::config::Config;
use crate::mirror::ShareMirror;
use std::time::Duration;
use tempfile::TempDir;

/// Create a test mirror pointed at a mock server.
/// Returns the mirror and the tempdir (which must be kept alive).
pub(crate) async fn create_test_mirror(base_url: &str) -> (ShareMirror, TempDir) {
    create_test_mirror_with(base_url, |_| {}).await
}

/// Create a test mirror with additional config tweaks applied on top of
/// the fast test defaults.
pub(crate) async fn create_test_mirror_with(
    base_url: &str,
    tweak: impl FnOnce(&mut Config),
) -> (ShareMirror, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.download_dir = temp_dir.path().join("downloads");
    config.remote.base_url = base_url.to_string();
    config.remote.request_timeout = Duration::from_secs(5);
    config.transfer.workers = 2;
    config.transfer.max_attempts = 3;
    config.queue.pop_timeout = Duration::from_millis(50);
    config.queue.poll_interval = Duration::from_millis(5);
    tweak(&mut config);

    let mirror = ShareMirror::new(config).await.unwrap();
    (mirror, temp_dir)
}
