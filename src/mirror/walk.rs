//! Recursive tree discovery — turns listing responses into work items.
//!
//! Walks the remote tree top-down: directories are created locally and
//! listed (with pagination), file nodes become transfer units on the
//! fresh queue unless they already exist on disk. Attribute failures
//! skip the affected subtree while siblings continue; listing failures
//! escalate, because a partial listing is not safe to mirror against.

use crate::error::{Error, Result};
use crate::types::{NodeAttributes, NodeId, NodeType};
use crate::unit::TransferUnit;

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use super::ShareMirror;

/// Discover the tree rooted at `root`, feeding the fresh queue as file
/// nodes turn up.
pub(super) async fn discover(mirror: &ShareMirror, root: &NodeId) -> Result<()> {
    let attrs = mirror.client.node_attributes(root).await.map_err(|e| {
        Error::RootUnavailable {
            id: root.clone(),
            reason: e.to_string(),
        }
    })?;

    tracing::info!(root = %root, name = %attrs.name, "starting discovery");
    process_node(
        mirror,
        root.clone(),
        attrs,
        mirror.config.download_dir.clone(),
    )
    .await
}

/// Process one node: enqueue a file, recurse into a directory, skip a
/// symlink. Boxed because the recursion depth follows the remote tree.
fn process_node(
    mirror: &ShareMirror,
    id: NodeId,
    attrs: NodeAttributes,
    dir: PathBuf,
) -> futures::future::BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        if mirror.cancel.is_cancelled() {
            return Err(Error::Interrupted);
        }

        if let Some(size) = attrs.size {
            // The cumulative directory sizes peak at the root, so the
            // maximum observed is the run's expected byte total.
            mirror.ledger.observe_expected(size);
        }

        match attrs.node_type {
            NodeType::File => enqueue_file(mirror, id, &attrs.name, dir),
            NodeType::Directory => descend(mirror, id, &attrs.name, dir).await,
            NodeType::Symlink => {
                tracing::warn!(node_id = %id, name = %attrs.name, "skipping symbolic link");
                mirror
                    .ledger
                    .record_error(format!("symbolic link '{}' skipped", attrs.name));
                Ok(())
            }
        }
    })
}

fn enqueue_file(mirror: &ShareMirror, id: NodeId, name: &str, dir: PathBuf) -> Result<()> {
    let final_path = dir.join(name);
    if final_path.exists() {
        tracing::debug!(path = %final_path.display(), "file exists, download skipped");
        mirror.ledger.record_existing(final_path);
        return Ok(());
    }

    let unit = TransferUnit::new(
        id,
        name,
        dir,
        mirror.config.transfer.max_attempts,
        mirror.config.transfer.max_priority,
        mirror.seq.fetch_add(1, Ordering::SeqCst),
    );
    mirror.claim_partial(unit.partial_path());
    tracing::debug!(path = %final_path.display(), "queued for download");
    mirror.pool.enqueue_fresh(unit);
    Ok(())
}

async fn descend(mirror: &ShareMirror, id: NodeId, name: &str, dir: PathBuf) -> Result<()> {
    let subdir = dir.join(name);
    if let Err(e) = tokio::fs::create_dir_all(&subdir).await {
        // Directory creation failures are not retryable; the subtree is
        // recorded and skipped while siblings continue.
        mirror.ledger.record_error(format!(
            "failed to create directory '{}': {}",
            subdir.display(),
            e
        ));
        return Ok(());
    }

    let children = mirror
        .client
        .list_children(&id)
        .await
        .map_err(|e| Error::Listing {
            id: id.clone(),
            reason: e.to_string(),
        })?;

    for child in children {
        match mirror.client.node_attributes(&child.id).await {
            Ok(child_attrs) => {
                process_node(mirror, child.id, child_attrs, subdir.clone()).await?;
            }
            Err(e) => {
                // Siblings keep going; only this subtree is lost.
                mirror.ledger.record_error(format!(
                    "failed to resolve node {} under '{}': {}",
                    child.id,
                    subdir.display(),
                    e
                ));
            }
        }
    }
    Ok(())
}
