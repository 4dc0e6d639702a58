//! Retrieval orchestration: local-first lookup with peer fallback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fileswarm_store::{FileStore, StoreError};
use fileswarm_types::{FileName, PeerDescriptor, RetrievalOutcome};
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::client::{FetchError, PeerClient};
use crate::probe::probe_peers;

type FlightCell = Arc<OnceCell<RetrievalOutcome>>;

/// Drives one retrieval end to end: local store, then probe fan-out,
/// then an ordered fetch-retry loop over the confirmed peers.
///
/// Cheap to clone; clones share the store, the HTTP client, and the
/// single-flight table.
#[derive(Clone)]
pub struct Retriever {
    inner: Arc<RetrieverInner>,
}

struct RetrieverInner {
    store: Arc<dyn FileStore>,
    client: PeerClient,
    registry: Vec<PeerDescriptor>,
    save_files: bool,
    probe_window: Duration,
    in_flight: Mutex<HashMap<String, FlightCell>>,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn FileStore>,
        client: PeerClient,
        registry: Vec<PeerDescriptor>,
        save_files: bool,
        probe_window: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(RetrieverInner {
                store,
                client,
                registry,
                save_files,
                probe_window,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn registry(&self) -> &[PeerDescriptor] {
        &self.inner.registry
    }

    /// Look up `name`, falling back to the peer registry on a local miss.
    pub async fn lookup(&self, name: &FileName) -> RetrievalOutcome {
        match self.inner.store.read(name).await {
            Ok(bytes) => {
                debug!(%name, len = bytes.len(), "local hit");
                return RetrievalOutcome::Hit(bytes);
            }
            Err(StoreError::NotFound) => {}
            Err(err) => {
                warn!(%name, error = %err, "local read failed, falling back to peers");
            }
        }

        // Single-flight: concurrent misses for the same name share one
        // probe/fetch sequence and all observe its settled outcome. If
        // the initiating task is cancelled mid-flight, the next waiter
        // takes over initialization.
        let cell: FlightCell = {
            let mut in_flight = self.inner.in_flight.lock();
            Arc::clone(in_flight.entry(name.as_str().to_string()).or_default())
        };

        let outcome = cell
            .get_or_init(|| self.fetch_from_peers(name))
            .await
            .clone();

        // Clear only our own entry; a later round may already have
        // replaced it after the cell settled.
        {
            let mut in_flight = self.inner.in_flight.lock();
            if let Some(current) = in_flight.get(name.as_str()) {
                if Arc::ptr_eq(current, &cell) {
                    in_flight.remove(name.as_str());
                }
            }
        }

        outcome
    }

    /// Existence probe entry point: the ordered subsequence of peers
    /// that confirmed possession within the probe window.
    pub async fn probe(&self, name: &FileName) -> Vec<PeerDescriptor> {
        probe_peers(
            &self.inner.client,
            &self.inner.registry,
            name,
            self.inner.probe_window,
        )
        .await
        .into_iter()
        .filter(|result| result.found)
        .map(|result| result.peer)
        .collect()
    }

    async fn fetch_from_peers(&self, name: &FileName) -> RetrievalOutcome {
        let confirmed = self.probe(name).await;
        if confirmed.is_empty() {
            info!(%name, "no peer holds the file");
            return RetrievalOutcome::Miss;
        }

        for peer in &confirmed {
            match self.inner.client.fetch(peer, name).await {
                Ok(bytes) => {
                    info!(%name, peer = %peer.address, len = bytes.len(), "fetched from peer");
                    self.persist_fetched(peer, name, &bytes).await;
                    return RetrievalOutcome::Fetched(bytes);
                }
                Err(FetchError::NotFound(status)) => {
                    // Stale probe; the next confirmed peer may still hold it.
                    debug!(%name, peer = %peer.address, %status, "peer no longer holds the file");
                }
                Err(FetchError::Unavailable(err)) => {
                    warn!(%name, peer = %peer.address, error = %err, "peer unreachable during fetch");
                }
            }
        }

        info!(%name, candidates = confirmed.len(), "all confirmed peers failed the fetch");
        RetrievalOutcome::Miss
    }

    /// Persist fetched content when caching is enabled both globally and
    /// for the source peer. A write failure is reported but never fails
    /// the fetch: content delivery takes priority over cache population.
    async fn persist_fetched(&self, peer: &PeerDescriptor, name: &FileName, bytes: &[u8]) {
        if !(self.inner.save_files && peer.caches_remote_files) {
            return;
        }

        match self.inner.store.write(name, bytes.to_vec()).await {
            Ok(()) => debug!(%name, len = bytes.len(), "cached fetched file"),
            Err(err) => warn!(%name, error = %err, "failed to persist fetched file"),
        }
    }
}
