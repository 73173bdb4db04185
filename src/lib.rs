//! # share-dl
//!
//! Concurrent, fair, resumable mirroring of remote share trees over HTTP.
//!
//! ## Design Philosophy
//!
//! share-dl is designed to be:
//! - **Fair** - fresh downloads and retries share the workers by weight,
//!   so neither can starve the other
//! - **Resumable** - transfers stage into partial files and resume with
//!   byte-range requests, across retries and across process restarts
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding
//! - **Isolated failure** - a failing file never aborts its siblings;
//!   it retries with decaying priority until its attempt budget runs out
//!
//! ## Quick Start
//!
//! ```no_run
//! use share_dl::{Config, NodeId, ShareMirror};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         download_dir: "./mirror".into(),
//!         ..Default::default()
//!     };
//!
//!     let mirror = ShareMirror::new(config).await?;
//!     let stats = mirror.mirror(&NodeId::new("00000042-root-node-id")).await?;
//!
//!     println!("{stats}");
//!     std::process::exit(stats.exit_code() as i32);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Remote metadata/content service client
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Weighted fairness scheduling (internal to the queue pool)
pub(crate) mod fairness;
/// Progress/outcome ledger and run statistics
pub mod ledger;
/// Mirror orchestration (decomposed into focused submodules)
pub mod mirror;
/// Fair dual-queue work pool
pub mod pool;
/// Core types
pub mod types;
/// Transfer units (per-file work records)
pub mod unit;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use client::{ChildEntry, ChildrenPage, ContentReply, ShareClient};
pub use config::{Config, QueueConfig, RemoteConfig, TransferConfig, parse_chunk_size};
pub use error::{Error, Result, ToExitCode, TransferError};
pub use ledger::{Ledger, RunStats};
pub use mirror::ShareMirror;
pub use pool::{FairQueuePool, QueueKind};
pub use types::{NodeAttributes, NodeId, NodeType, TransferOutcome};
pub use unit::TransferUnit;

/// Helper function to run a mirror with graceful signal handling.
///
/// Mirrors the tree rooted at `root`; a termination signal cancels the
/// run, which stops further chunk writes, leaves partial files on disk
/// for resumption and yields an explicitly incomplete statistics report.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use share_dl::{Config, NodeId, ShareMirror, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mirror = ShareMirror::new(Config::default()).await?;
///     let stats = run_with_shutdown(mirror, NodeId::new("root-id")).await?;
///     println!("{stats}");
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(mirror: ShareMirror, root: NodeId) -> Result<RunStats> {
    let cancel = mirror.cancel_token();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::warn!("interrupt received, producing incomplete report");
        cancel.cancel();
    });

    mirror.mirror(&root).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
