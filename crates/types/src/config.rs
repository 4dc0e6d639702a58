//! Node configuration schema. Loaded once at process start from a YAML
//! file; never hot-reloaded.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::peer::{PeerAddressError, PeerDescriptor};

fn default_listen_addr() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("storage")
}

fn default_save_files() -> bool {
    true
}

fn default_probe_timeout_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

/// Top-level node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Human-readable node identifier; defaults to the listen address.
    #[serde(default)]
    pub node_id: Option<String>,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Directory backing the local store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Global switch for persisting content fetched from peers.
    #[serde(default = "default_save_files")]
    pub save_files: bool,

    /// Bounded wait window for one existence-probe round.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Ordered peer registry. Order matters: probe fan-out and fetch
    /// tie-break both follow it.
    #[serde(default)]
    pub peers: Vec<PeerEntry>,
}

/// One peer entry as written in the YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeerEntry {
    pub address: String,

    /// Whether content fetched from this peer participates in the local
    /// cache.
    #[serde(default = "default_true", rename = "participates_in_local_cache")]
    pub caches_remote_files: bool,
}

impl NodeConfig {
    pub fn node_id(&self) -> String {
        self.node_id
            .clone()
            .unwrap_or_else(|| self.listen_addr.clone())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Validate the peer entries into the ordered registry.
    pub fn registry(&self) -> Result<Vec<PeerDescriptor>, PeerAddressError> {
        self.peers
            .iter()
            .map(|entry| PeerDescriptor::new(&entry.address, entry.caches_remote_files))
            .collect()
    }
}
