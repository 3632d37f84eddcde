//! Connection loss and recovery.
//!
//! When the socket leaves `Connected`, every watched channel is marked stale.
//! When a connection is established again, stale channels reload
//! concurrently. A channel that fails to reload stays stale and is retried on
//! the next reconnect.

use crate::logic::ChannelLogic;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// Mark every channel as needing a resync. Returns how many were marked.
pub fn mark_channels_stale(channels: &[Arc<ChannelLogic>]) -> usize {
    for channel in channels {
        channel.mark_needs_sync();
    }
    channels.len()
}

/// Reload every stale channel. Returns how many reloaded successfully.
pub async fn reconcile_stale_channels(channels: Vec<Arc<ChannelLogic>>) -> usize {
    let stale: Vec<_> = channels.into_iter().filter(|c| c.needs_sync()).collect();
    if stale.is_empty() {
        return 0;
    }
    info!(channels = stale.len(), "Reconciling channels after reconnect");

    let results = join_all(stale.iter().map(|channel| async move {
        (channel.cid().clone(), channel.reconcile().await)
    }))
    .await;

    let mut reconciled = 0;
    for (cid, result) in results {
        match result {
            Ok(()) => reconciled += 1,
            Err(e) => {
                warn!(cid = %cid, error = %e, code = e.error_code(), "Channel reconcile failed");
            }
        }
    }
    reconciled
}
