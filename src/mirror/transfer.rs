//! One resumable download attempt.
//!
//! An attempt streams bytes into the unit's partial file and promotes it
//! to the final name with an atomic rename. A leftover partial (from an
//! earlier attempt or an earlier run) is resumed with a byte-range
//! request instead of being re-downloaded.

use crate::client::ContentReply;
use crate::error::TransferError;
use crate::types::TransferOutcome;
use crate::unit::TransferUnit;

use std::path::Path;
use tokio::io::{AsyncWriteExt, BufWriter};

use super::ShareMirror;

/// Perform one attempt on a transfer unit.
///
/// Sequence per attempt:
/// 1. If the final path already exists, record it and succeed without
///    touching the network.
/// 2. If a partial file is staged, request content from its length
///    onward; otherwise request the full content.
/// 3. On HTTP 416, re-query the node size: equal to the staged length
///    means the file is fully staged and only the rename remains;
///    anything else discards the partial and fails with
///    [`TransferError::RangeMismatch`].
/// 4. Stream the body into the partial file (append on resume), honoring
///    cancellation between chunks.
/// 5. Atomically rename the partial to the final name.
pub(super) async fn attempt(
    mirror: &ShareMirror,
    unit: &TransferUnit,
) -> Result<TransferOutcome, TransferError> {
    let final_path = unit.final_path();
    if final_path.exists() {
        tracing::debug!(path = %final_path.display(), "file exists, download skipped");
        mirror.ledger.record_existing(final_path);
        return Ok(TransferOutcome::Existing);
    }

    let partial = unit.partial_path();
    let staged = match tokio::fs::metadata(&partial).await {
        Ok(meta) => meta.len(),
        Err(_) => 0,
    };
    let offset = (staged > 0).then_some(staged);

    let response = match mirror.client.content(unit.node_id(), offset).await? {
        ContentReply::Stream(response) => response,
        ContentReply::RangeNotSatisfiable => {
            return finish_unsatisfiable_range(mirror, unit, &partial, staged).await;
        }
    };

    // A server may answer a range request with the full body; start the
    // partial over in that case instead of appending a second copy.
    let resumed = offset.is_some()
        && response.status() == reqwest::StatusCode::PARTIAL_CONTENT;
    if offset.is_some() && !resumed {
        tracing::debug!(
            node_id = %unit.node_id(),
            "range request answered with full content, restarting partial"
        );
    }

    stream_body(mirror, response, &partial, resumed).await?;

    promote(&partial, &final_path).await?;
    tracing::info!(path = %final_path.display(), "file downloaded");
    mirror.ledger.record_finished(final_path);
    Ok(TransferOutcome::Completed)
}

/// Handle HTTP 416: the staged partial either already holds every byte
/// (finish with a rename) or disagrees with the remote size (discard it
/// and fail the attempt so the retry starts clean).
async fn finish_unsatisfiable_range(
    mirror: &ShareMirror,
    unit: &TransferUnit,
    partial: &Path,
    staged: u64,
) -> Result<TransferOutcome, TransferError> {
    let attrs = mirror.client.node_attributes(unit.node_id()).await?;
    let remote = attrs.size.unwrap_or(0);

    if remote == staged {
        let final_path = unit.final_path();
        promote(partial, &final_path).await?;
        tracing::info!(path = %final_path.display(), "fully staged file promoted");
        mirror.ledger.record_finished(final_path);
        return Ok(TransferOutcome::AlreadyStaged);
    }

    // A stale partial would reproduce this mismatch on every retry.
    if let Err(e) = tokio::fs::remove_file(partial).await {
        tracing::warn!(
            path = %partial.display(),
            error = %e,
            "failed to remove mismatched partial file"
        );
    }
    Err(TransferError::RangeMismatch { staged, remote })
}

/// Stream the response body into the partial file through a write buffer
/// bounded by the configured chunk size, flushing on completion so a
/// later process can resume from the file length.
async fn stream_body(
    mirror: &ShareMirror,
    mut response: reqwest::Response,
    partial: &Path,
    resumed: bool,
) -> Result<(), TransferError> {
    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(resumed)
        .write(true)
        .truncate(!resumed)
        .open(partial)
        .await?;

    let capacity = usize::try_from(mirror.config.transfer.chunk_size)
        .unwrap_or(usize::MAX)
        .clamp(1, 256 * 1024 * 1024);
    let mut writer = BufWriter::with_capacity(capacity, file);

    loop {
        let chunk = tokio::select! {
            _ = mirror.cancel.cancelled() => {
                // Keep what was written so the next run resumes from it.
                writer.flush().await.ok();
                return Err(TransferError::Cancelled);
            }
            chunk = response.chunk() => chunk?,
        };

        match chunk {
            Some(bytes) => writer.write_all(&bytes).await?,
            None => break,
        }
    }

    writer.flush().await?;
    Ok(())
}

/// Atomically promote the partial file to its final name.
async fn promote(partial: &Path, final_path: &Path) -> Result<(), TransferError> {
    tokio::fs::rename(partial, final_path)
        .await
        .map_err(TransferError::RenameFailed)
}
