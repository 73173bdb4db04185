//! Mirror orchestration split into focused submodules.
//!
//! The [`ShareMirror`] struct and its collaborators are organized by
//! domain:
//! - [`walk`] - Recursive tree discovery feeding the queue pool
//! - [`transfer`] - One resumable download attempt per invocation
//! - [`workers`] - The fixed worker pool draining the queue pool
//! - [`cleanup`] - Stale partial-file sweep of the destination tree

mod cleanup;
mod transfer;
mod walk;
mod workers;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::client::ShareClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ledger::{Ledger, RunStats};
use crate::pool::FairQueuePool;
use crate::types::NodeId;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};

/// Mirrors a remote share tree onto local disk (cloneable - all shared
/// state is Arc-wrapped).
///
/// One instance owns the whole scheduling context: the queue pool, the
/// outcome ledger, the remote client and the cancellation token. Nothing
/// here is a process-wide singleton; tests run several mirrors side by
/// side.
#[derive(Clone)]
pub struct ShareMirror {
    /// Configuration (shared across workers)
    pub(crate) config: Arc<Config>,
    /// Remote metadata/content client
    pub(crate) client: ShareClient,
    /// Fair dual-queue pool feeding the workers
    pub(crate) pool: Arc<FairQueuePool>,
    /// Outcome ledger behind the final report
    pub(crate) ledger: Arc<Ledger>,
    /// Cancellation token observed by the walker, workers and streams
    pub(crate) cancel: tokio_util::sync::CancellationToken,
    /// Arrival counter for deterministic unit ordering
    pub(crate) seq: Arc<AtomicU64>,
    /// Partial paths claimed by units of this run; everything else
    /// bearing the partial suffix is stale and swept
    pub(crate) claimed: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ShareMirror {
    /// Create a new mirror instance.
    ///
    /// Validates the configuration and creates the destination
    /// directory; fails fast on configuration errors so nothing is
    /// scheduled against a bad setup.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "failed to create download directory '{}': {}",
                        config.download_dir.display(),
                        e
                    ),
                ))
            })?;

        let client = ShareClient::new(&config.remote)?;
        let pool = Arc::new(FairQueuePool::new(&config.queue));

        Ok(Self {
            config: Arc::new(config),
            client,
            pool,
            ledger: Arc::new(Ledger::new()),
            cancel: tokio_util::sync::CancellationToken::new(),
            seq: Arc::new(AtomicU64::new(0)),
            claimed: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Token external code can use to interrupt the run. Cancelling it
    /// stops chunk writes, parks the workers and yields an explicitly
    /// incomplete statistics report.
    pub fn cancel_token(&self) -> tokio_util::sync::CancellationToken {
        self.cancel.clone()
    }

    /// Record a partial path as belonging to this run (exempt from the
    /// stale sweep).
    pub(crate) fn claim_partial(&self, path: PathBuf) {
        self.claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path);
    }

    /// Mirror the share tree rooted at `root` into the configured
    /// destination directory.
    ///
    /// Spawns the worker pool, discovers the tree (feeding the fresh
    /// queue as it goes), sweeps stale partial files once discovery has
    /// fixed the claimed set, and waits for the pool to drain. Returns
    /// the drained ledger as [`RunStats`]; terminally failed transfers
    /// are inside the stats (`has_failures`), while discovery failures
    /// abort the run with an error after logging the partial report.
    pub async fn mirror(&self, root: &NodeId) -> Result<RunStats> {
        let workers = workers::spawn(self.clone(), self.config.transfer.workers);

        let walk_result = walk::discover(self, root).await;

        let complete = match walk_result {
            Ok(()) => {
                self.pool.close_fresh();

                self.sweep_stale_partials().await;

                tokio::select! {
                    _ = self.pool.drain_and_wait() => true,
                    _ = self.cancel.cancelled() => false,
                }
            }
            Err(Error::Interrupted) => false,
            Err(e) => {
                // Discovery failed: nothing below this point is safe to
                // mirror against. Park the workers and surface the
                // partial report before propagating.
                self.cancel.cancel();
                futures::future::join_all(workers).await;
                let stats = self.ledger.snapshot(false);
                tracing::error!(stats = %stats, error = %e, "run aborted during discovery");
                return Err(e);
            }
        };

        self.cancel.cancel();
        futures::future::join_all(workers).await;

        let stats = self.ledger.snapshot(complete);
        if complete {
            tracing::info!(
                finished = stats.finished_files,
                existing = stats.existing_files,
                errors = stats.errors.len(),
                "mirror run finished"
            );
        } else {
            tracing::warn!("mirror run interrupted; partial files left on disk for resumption");
        }
        Ok(stats)
    }

    async fn sweep_stale_partials(&self) {
        let download_dir = self.config.download_dir.clone();
        let claimed = self
            .claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        let removed = tokio::task::spawn_blocking(move || {
            cleanup::sweep_stale_partials(&download_dir, &claimed)
        })
        .await
        .unwrap_or(0);

        if removed > 0 {
            tracing::info!(removed, "removed stale partial files from earlier runs");
        }
    }
}
