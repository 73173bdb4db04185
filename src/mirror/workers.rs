//! Worker pool — fixed set of tasks draining the fair queue pool.

use crate::error::TransferError;
use crate::pool::QueueKind;

use super::{ShareMirror, transfer};

/// Spawn `count` workers against the mirror's queue pool.
///
/// Workers never terminate on their own; they park once the mirror's
/// cancellation token fires (after drain, or on interrupt).
pub(super) fn spawn(mirror: ShareMirror, count: usize) -> Vec<tokio::task::JoinHandle<()>> {
    (0..count)
        .map(|worker_id| {
            let mirror = mirror.clone();
            tokio::spawn(async move {
                worker_loop(mirror, worker_id).await;
            })
        })
        .collect()
}

/// One worker: ask the pool which queue to serve, pop with a bounded
/// timeout, run one attempt, re-enqueue failures as retries, acknowledge.
async fn worker_loop(mirror: ShareMirror, worker_id: usize) {
    tracing::debug!(worker_id, "worker started");

    loop {
        if mirror.cancel.is_cancelled() {
            break;
        }

        let kind = mirror.pool.next_queue_for(worker_id);
        let Some(mut unit) = mirror.pool.pop(kind).await else {
            // Timed-out pop: re-evaluate pool state and try again.
            continue;
        };

        if kind == QueueKind::Fresh {
            // First attempt on this unit: track its partial path so an
            // interrupted run still accounts for the in-flight bytes.
            mirror.ledger.track_partial(unit.partial_path());
        }

        if !unit.record_attempt() {
            let reason = unit.last_error().unwrap_or("unknown error");
            mirror.ledger.record_error(format!(
                "download of '{}' (node {}) failed after exhausting all attempts: {}",
                unit.final_path().display(),
                unit.node_id(),
                reason
            ));
            mirror.pool.ack(kind);
            continue;
        }

        match transfer::attempt(&mirror, &unit).await {
            Ok(outcome) => {
                tracing::debug!(worker_id, node_id = %unit.node_id(), ?outcome, "attempt succeeded");
            }
            Err(TransferError::Cancelled) => {
                // Run is ending; the partial stays on disk for the next
                // run and the unit is not retried.
                tracing::debug!(worker_id, node_id = %unit.node_id(), "attempt cancelled");
            }
            Err(err) => {
                tracing::warn!(
                    worker_id,
                    node_id = %unit.node_id(),
                    error = %err,
                    remaining_attempts = unit.remaining_attempts(),
                    priority = unit.priority(),
                    "attempt failed, scheduling retry"
                );
                unit.note_failure(err.to_string());
                // Re-enqueue before the ack so the drain barrier never
                // observes the unit in neither queue.
                mirror.pool.enqueue_retry(unit);
            }
        }

        mirror.pool.ack(kind);
    }

    tracing::debug!(worker_id, "worker parked");
}
