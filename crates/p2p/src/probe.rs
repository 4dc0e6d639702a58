//! Concurrent existence probing across the peer registry.

use std::time::Duration;

use fileswarm_types::{FileName, PeerDescriptor, ProbeResult};
use futures::future::join_all;
use tokio::time::timeout;
use tracing::debug;

use crate::client::PeerClient;

/// Fan out one probe per registry entry and wait at most `window` for
/// the round.
///
/// All probes launch concurrently; the join is keyed by registry
/// position, so the returned results preserve registry order no matter
/// which peer answered first. A probe that errors or misses the window
/// is a negative result for that peer; the round itself never fails.
pub async fn probe_peers(
    client: &PeerClient,
    registry: &[PeerDescriptor],
    name: &FileName,
    window: Duration,
) -> Vec<ProbeResult> {
    let probes = registry.iter().map(|peer| async move {
        let found = matches!(timeout(window, client.probe(peer, name)).await, Ok(true));
        ProbeResult {
            peer: peer.clone(),
            found,
        }
    });

    let results = join_all(probes).await;
    debug!(
        %name,
        confirmed = results.iter().filter(|result| result.found).count(),
        probed = results.len(),
        "probe round finished"
    );
    results
}
