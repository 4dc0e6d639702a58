//! Outbound HTTP primitives for the peer wire protocol.

use std::time::Duration;

use fileswarm_types::{FileName, PeerDescriptor};
use reqwest::{Client, StatusCode};
use tracing::debug;

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a full-content fetch from one peer failed. Both variants are
/// non-fatal to the request: the orchestrator moves on to the next
/// confirmed candidate.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// The peer could not be reached at the network level.
    #[error("peer unreachable: {0}")]
    Unavailable(#[source] reqwest::Error),
    /// The peer answered but does not hold the file. Probe results are
    /// hints, not guarantees, so this can follow a positive probe.
    #[error("peer responded with status {0}")]
    NotFound(StatusCode),
}

/// Shared outbound client for probes and fetches.
#[derive(Clone)]
pub struct PeerClient {
    client: Client,
}

impl PeerClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Lightweight existence probe: `GET <peer>/api/<name>`.
    ///
    /// The decimal size in the response body is incidental; any 2xx
    /// answer counts as possession. Every failure mode is a negative
    /// signal for this peer only.
    pub async fn probe(&self, peer: &PeerDescriptor, name: &FileName) -> bool {
        let url = peer.probe_url(name);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                // The body carries the peer's local size; existence is
                // all the caller needs.
                let size = response.text().await.unwrap_or_default();
                debug!(%url, %size, "probe confirmed");
                true
            }
            Ok(response) => {
                debug!(%url, status = %response.status(), "probe negative");
                false
            }
            Err(err) => {
                debug!(%url, error = %err, "probe failed");
                false
            }
        }
    }

    /// Full-content fetch: `GET <peer>/<name>`.
    pub async fn fetch(
        &self,
        peer: &PeerDescriptor,
        name: &FileName,
    ) -> Result<Vec<u8>, FetchError> {
        let url = peer.fetch_url(name);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(FetchError::Unavailable)?;

        if !response.status().is_success() {
            return Err(FetchError::NotFound(response.status()));
        }

        let bytes = response.bytes().await.map_err(FetchError::Unavailable)?;
        Ok(bytes.to_vec())
    }
}
